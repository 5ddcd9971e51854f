//! End-to-end tests for the archive codec and RAG loader.

use aura_archive::{ArchiveError, ArchiveReader, ArchiveWriter, Datapoint, RagLoader};

fn doc(id: &str, text: &str, source: &str) -> Datapoint {
    let ext = source
        .rsplit_once('.')
        .map(|(_, e)| format!(".{e}"))
        .unwrap_or_default();
    Datapoint::text(id, text)
        .with_metadata("source", source)
        .with_metadata("file_extension", ext)
}

fn compile(dir: &std::path::Path, docs: &[Datapoint]) -> std::path::PathBuf {
    let path = dir.join("knowledge.aura");
    let mut writer = ArchiveWriter::create(&path).unwrap();
    for d in docs {
        writer.append(d).unwrap();
    }
    writer.finish().unwrap();
    path
}

#[test]
fn test_roundtrip_equality_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let docs = vec![
        doc("doc_003", "zebra migration patterns", "wild/zebra.txt"),
        doc("doc_001", "alpha release checklist", "eng/release.md"),
        doc("doc_002", "", "empty/blank.txt"),
    ];
    let path = compile(dir.path(), &docs);

    let reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.len(), 3);
    let decoded: Vec<Datapoint> = reader.iter().map(|r| r.unwrap()).collect();
    assert_eq!(decoded, docs);
}

#[test]
fn test_index_lookup_matches_original_payload() {
    let dir = tempfile::tempdir().unwrap();
    let docs: Vec<Datapoint> = (0..50)
        .map(|i| doc(&format!("doc_{i:03}"), &format!("payload number {i}"), "gen/all.txt"))
        .collect();
    let path = compile(dir.path(), &docs);

    let loader = RagLoader::open(&path).unwrap();
    for i in [0, 7, 23, 49] {
        assert_eq!(
            loader.get_text_by_id(&format!("doc_{i:03}")).unwrap(),
            format!("payload number {i}")
        );
    }
    assert!(matches!(
        loader.get_text_by_id("doc_999"),
        Err(ArchiveError::DatapointNotFound { .. })
    ));
}

#[test]
fn test_payload_bytes_are_opaque() {
    // Payloads that look like JSON, shell, or random binary come back
    // verbatim and are never interpreted.
    let dir = tempfile::tempdir().unwrap();
    let binary: Vec<u8> = (0u16..512).map(|i| (i % 251) as u8).collect();
    let mut hostile = Datapoint::text("hostile", r#"{"__class__": "os.system"}"#);
    hostile.payload.extend_from_slice(b"\x00\xff\xfe");
    let mut blob = Datapoint::text("blob", "");
    blob.payload = binary.clone();

    let path = compile(dir.path(), &[hostile.clone(), blob.clone()]);
    let reader = ArchiveReader::open(&path).unwrap();
    assert_eq!(reader.read("hostile").unwrap().payload, hostile.payload);
    assert_eq!(reader.read("blob").unwrap().payload, binary);
}

#[test]
fn test_loader_filters_and_stats() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let docs = vec![
        doc("a", "first", "notes/a.md"),
        doc("b", "second", "notes/b.md"),
        doc("c", "third", "sheets/c.csv"),
    ];
    let path = compile(dir.path(), &docs);
    let loader = RagLoader::open(&path)?;

    let md_ids: Vec<String> = loader.filter_by_extension("md")?.collect::<Result<_, _>>()?;
    assert_eq!(md_ids, vec!["a", "b"]);

    let sheet_ids: Vec<String> = loader.filter_by_source("sheets")?.collect::<Result<_, _>>()?;
    assert_eq!(sheet_ids, vec!["c"]);

    let stats = loader.get_stats()?;
    assert_eq!(stats.total_datapoints, 3);
    assert_eq!(stats.extensions.len(), 2);
    Ok(())
}

#[test]
fn test_corrupt_archive_surfaces_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = compile(dir.path(), &[doc("a", "content", "a.txt")]);

    // Flip the magic.
    let mut bytes = std::fs::read(&path).unwrap();
    let n = bytes.len();
    bytes[n - 4..].copy_from_slice(b"NOPE");
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        ArchiveReader::open(&path),
        Err(ArchiveError::InvalidMagic { .. })
    ));
}

#[test]
fn test_truncated_archive_surfaces_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = compile(dir.path(), &[doc("a", "content", "a.txt")]);
    let bytes = std::fs::read(&path).unwrap();

    // Chop the file in the middle of the index region; the footer (and
    // its magic) goes with it.
    let truncated = &bytes[..bytes.len() / 2];
    std::fs::write(&path, truncated).unwrap();

    match ArchiveReader::open(&path) {
        Err(ArchiveError::InvalidMagic { .. })
        | Err(ArchiveError::Truncated { .. })
        | Err(ArchiveError::CorruptIndex(_)) => {}
        other => panic!("expected a format error, got {other:?}"),
    }
}
