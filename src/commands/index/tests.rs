use std::cell::RefCell;
use std::fs::{self, File};
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;

use super::import::{BatchSink, ImportOptions, import_items};
use super::run::Indexer;
use crate::backend::{BulkBackend, IndexDocument};
use crate::error::{BackendError, InputError};
use crate::model::{Item, ItemCondition, ItemNoDesc, Status};
use crate::tokenizer::Tokenizer;

const HEADER: &str = "id,name,description,status,created,category_id\n";

fn rows(ids: std::ops::Range<u32>) -> String {
    let mut out = String::from(HEADER);
    for id in ids {
        out.push_str(&format!(
            "m{id},item {id},desc {id},on_sale,2021-03-04 05:06:07 UTC,{}\n",
            id % 7
        ));
    }
    out
}

fn write_gzip(path: &Path, contents: &str) {
    let file = File::create(path).expect("create gzip fixture");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(contents.as_bytes())
        .expect("write gzip fixture");
    encoder.finish().expect("finish gzip fixture");
}

const NO_DESC_HEADER: &str = "id,name,status,created,updated,category_id,price,item_condition\n";

struct CollectingSink<T = Item> {
    batches: Vec<Vec<T>>,
    stop_after: Option<usize>,
    flushed: bool,
}

impl<T> Default for CollectingSink<T> {
    fn default() -> Self {
        Self {
            batches: Vec::new(),
            stop_after: None,
            flushed: false,
        }
    }
}

impl CollectingSink<Item> {
    fn ids(&self) -> Vec<String> {
        self.batches
            .iter()
            .flatten()
            .map(|item| item.id.clone())
            .collect()
    }
}

impl<T> BatchSink<T> for CollectingSink<T> {
    fn accept(&mut self, batch: Vec<T>) -> Result<ControlFlow<()>> {
        self.batches.push(batch);
        if self.stop_after == Some(self.batches.len()) {
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        Ok(())
    }
}

fn options(dir: &Path, batch_size: usize, max: usize) -> ImportOptions<'_> {
    ImportOptions {
        data_dir: dir,
        filename_filter: ".csv",
        batch_size,
        max,
    }
}

#[test]
fn import_reads_plain_and_gzip_files_in_name_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("b_items.csv"), rows(3..5)).expect("write plain");
    write_gzip(&dir.path().join("a_items.csv.gz"), &rows(0..3));
    fs::write(dir.path().join("notes.txt"), "ignored").expect("write other");

    let mut sink = CollectingSink::default();
    let summary = import_items::<Item>(&options(dir.path(), 2, 0), &mut sink).expect("import");

    assert_eq!(summary.files, 2);
    assert_eq!(summary.items, 5);
    assert!(!summary.halted);
    assert!(sink.flushed);
    assert_eq!(sink.ids(), vec!["m0", "m1", "m2", "m3", "m4"]);
    // Batches never span files.
    let sizes: Vec<usize> = sink.batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 1, 2]);
}

#[test]
fn import_reads_every_member_of_a_concatenated_gzip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("items.csv.gz");
    write_gzip(&path, &rows(0..3));

    // Second member appended after the first one's trailer, without a header.
    let second = rows(3..6);
    let body = second.strip_prefix(HEADER).expect("rows start with header");
    let file = fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .expect("reopen gzip fixture");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(body.as_bytes()).expect("write second member");
    encoder.finish().expect("finish second member");

    let mut sink = CollectingSink::default();
    let summary = import_items::<Item>(&options(dir.path(), 10, 0), &mut sink).expect("import");

    assert_eq!(summary.items, 6);
    assert_eq!(sink.ids(), vec!["m0", "m1", "m2", "m3", "m4", "m5"]);
}

#[test]
fn import_parses_item_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("items.csv"),
        format!("{HEADER}x1,\"Lamp, brass\",old lamp,sold_out,2021-03-04 05:06:07 JST,12\nx2,Cup,,mystery,2021-03-05 00:00:00 UTC,3\n"),
    )
    .expect("write fixture");

    let mut sink = CollectingSink::default();
    import_items::<Item>(&options(dir.path(), 10, 0), &mut sink).expect("import");

    let items: Vec<&Item> = sink.batches.iter().flatten().collect();
    assert_eq!(
        *items[0],
        Item {
            id: "x1".to_string(),
            name: "Lamp, brass".to_string(),
            desc: "old lamp".to_string(),
            status: Status::SoldOut,
            created: 1_614_834_367_000,
            category_id: 12,
        }
    );
    assert_eq!(items[1].status, Status::Other);
    assert_eq!(items[1].desc, "");
}

#[test]
fn import_parses_no_desc_item_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("items.csv"),
        format!("{NO_DESC_HEADER}n1,\"Lamp, brass\",cancel,1614834367000,1614920767000,12,4800,2\nn2,Cup,trading,1,2,3,300,9\n"),
    )
    .expect("write fixture");

    let mut sink = CollectingSink::<ItemNoDesc>::default();
    let summary =
        import_items::<ItemNoDesc>(&options(dir.path(), 10, 0), &mut sink).expect("import");
    assert_eq!(summary.items, 2);

    let items: Vec<&ItemNoDesc> = sink.batches.iter().flatten().collect();
    assert_eq!(
        *items[0],
        ItemNoDesc {
            id: "n1".to_string(),
            name: "Lamp, brass".to_string(),
            status: Status::Cancelled,
            created: 1_614_834_367_000,
            updated: 1_614_920_767_000,
            category_id: 12,
            price: 4800,
            item_condition: ItemCondition::Good,
        }
    );
    assert_eq!(items[1].status, Status::Trading);
    assert_eq!(items[1].item_condition, ItemCondition::Other);
}

#[test]
fn import_keeps_item_shapes_apart() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("items.csv"), rows(0..2)).expect("write fixture");
    let err = import_items::<ItemNoDesc>(
        &options(dir.path(), 10, 0),
        &mut CollectingSink::<ItemNoDesc>::default(),
    )
    .expect_err("six-column export is not a no-desc export");
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::InvalidItemRecord { record: 0, .. })
    ));

    fs::write(
        dir.path().join("items.csv"),
        format!("{NO_DESC_HEADER}n1,a,on_sale,soon,2,3,4,1\n"),
    )
    .expect("rewrite fixture");
    let err = import_items::<ItemNoDesc>(
        &options(dir.path(), 10, 0),
        &mut CollectingSink::<ItemNoDesc>::default(),
    )
    .expect_err("non-numeric created is fatal");
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::InvalidItemRecord { record: 1, .. })
    ));
}

#[test]
fn import_honours_max_and_sink_break() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("a.csv"), rows(0..10)).expect("write a");
    fs::write(dir.path().join("b.csv"), rows(10..20)).expect("write b");

    let mut limited = CollectingSink::default();
    let summary = import_items::<Item>(&options(dir.path(), 4, 6), &mut limited).expect("import");
    assert_eq!(summary.items, 6);
    assert!(summary.halted);
    assert_eq!(limited.ids().len(), 6);

    let mut breaking = CollectingSink {
        stop_after: Some(1),
        ..CollectingSink::default()
    };
    let summary = import_items::<Item>(&options(dir.path(), 4, 0), &mut breaking).expect("import");
    assert!(summary.halted);
    assert_eq!(summary.files, 1);
    assert_eq!(breaking.ids().len(), 4);
    assert!(breaking.flushed);
}

#[test]
fn import_rejects_unexpected_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("items.csv"),
        "id,name,desc,status,created,category_id\nx,a,b,on_sale,2021-03-04 05:06:07 UTC,1\n",
    )
    .expect("write fixture");

    let err = import_items::<Item>(&options(dir.path(), 10, 0), &mut CollectingSink::<Item>::default())
        .expect_err("wrong header is fatal");
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::InvalidItemRecord { record: 0, .. })
    ));
}

#[test]
fn import_rejects_bad_category_and_timestamp() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("items.csv"),
        format!("{HEADER}x,a,b,on_sale,2021-03-04 05:06:07 UTC,shoes\n"),
    )
    .expect("write fixture");
    let err = import_items::<Item>(&options(dir.path(), 10, 0), &mut CollectingSink::<Item>::default())
        .expect_err("bad category is fatal");
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::InvalidItemRecord { record: 1, .. })
    ));

    fs::write(
        dir.path().join("items.csv"),
        format!("{HEADER}x,a,b,on_sale,04/03/2021,1\n"),
    )
    .expect("rewrite fixture");
    let err = import_items::<Item>(&options(dir.path(), 10, 0), &mut CollectingSink::<Item>::default())
        .expect_err("bad timestamp is fatal");
    assert!(err.chain().any(|cause| cause.is::<InputError>()));
}

#[test]
fn import_reports_missing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing");
    let err = import_items::<Item>(&options(&missing, 10, 0), &mut CollectingSink::<Item>::default())
        .expect_err("missing directory is fatal");
    assert!(matches!(
        err.downcast_ref::<InputError>(),
        Some(InputError::Unreadable { .. })
    ));
}

struct UppercaseTokenizer;

impl Tokenizer for UppercaseTokenizer {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(str::to_uppercase).collect())
    }
}

#[derive(Default)]
struct RecordingBulk {
    calls: RefCell<Vec<Vec<Value>>>,
    reject: bool,
}

impl BulkBackend for RecordingBulk {
    fn bulk_index<D: IndexDocument>(&self, documents: &[D]) -> Result<(), BackendError> {
        if self.reject {
            return Err(BackendError::BulkRejected {
                body: "{\"errors\":true}".to_string(),
            });
        }
        let sources = documents
            .iter()
            .map(|document| serde_json::to_value(document).expect("document serializes"))
            .collect();
        self.calls.borrow_mut().push(sources);
        Ok(())
    }
}

fn item(id: &str, name: &str, desc: &str) -> Item {
    Item {
        id: id.to_string(),
        name: name.to_string(),
        desc: desc.to_string(),
        status: Status::OnSale,
        created: 0,
        category_id: 1,
    }
}

#[test]
fn indexer_segments_text_before_bulk_write() {
    let backend = RecordingBulk::default();
    let mut indexer = Indexer::new(&backend, &UppercaseTokenizer);

    let flow = indexer
        .accept(vec![item("a", "red  shoes", "size 9"), item("b", "hat", "")])
        .expect("batch indexes");
    assert!(flow.is_continue());
    BatchSink::<Item>::flush(&mut indexer).expect("flush");

    let calls = backend.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0]["name"], "RED SHOES");
    assert_eq!(calls[0][0]["desc"], "SIZE 9");
    assert_eq!(calls[0][1]["desc"], "");
    assert_eq!(indexer.indexed(), 2);
}

#[test]
fn indexer_segments_only_the_name_without_desc() {
    let backend = RecordingBulk::default();
    let mut indexer = Indexer::new(&backend, &UppercaseTokenizer);

    let listing = ItemNoDesc {
        id: "n1".to_string(),
        name: "blue  kettle".to_string(),
        status: Status::SoldOut,
        created: 10,
        updated: 20,
        category_id: 4,
        price: 1500,
        item_condition: ItemCondition::Poor,
    };
    let flow = indexer.accept(vec![listing]).expect("batch indexes");
    assert!(flow.is_continue());

    let calls = backend.calls.borrow();
    let source = &calls[0][0];
    assert_eq!(source["name"], "BLUE KETTLE");
    assert!(source.get("desc").is_none());
    assert_eq!(source["status"], 3);
    assert_eq!(source["updated"], 20);
    assert_eq!(source["item_condition"], 3);
    assert_eq!(indexer.indexed(), 1);
}

#[test]
fn indexer_fails_on_rejected_bulk() {
    let backend = RecordingBulk {
        reject: true,
        ..RecordingBulk::default()
    };
    let mut indexer = Indexer::new(&backend, &UppercaseTokenizer);

    let err = indexer
        .accept(vec![item("a", "x", "y")])
        .expect_err("rejected bulk is fatal");
    assert!(format!("{err:#}").contains("bulk request #1"));
    assert!(err.chain().any(|cause| cause.is::<BackendError>()));
}
