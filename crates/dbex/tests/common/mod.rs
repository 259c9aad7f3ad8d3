//! Fixtures shared by the pipeline tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use dbex::core::{Column, ForeignKey, SqlType, SqlValue, Table};
use dbex::drivers::MemoryDatabase;
use dbex::{Backup, BackupConfig, ProgressMonitor, Task};
use rust_decimal::Decimal;

/// Collects every progress message.
#[derive(Default)]
pub struct RecordingMonitor {
    messages: Mutex<Vec<String>>,
}

impl RecordingMonitor {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl ProgressMonitor for RecordingMonitor {
    fn begin(&self, task: &Task) {
        self.messages.lock().unwrap().push(format!("begin {}", task));
    }

    fn end(&self, task: &Task) {
        self.messages.lock().unwrap().push(format!("end {}", task));
    }

    fn total_number_of_tables(&self, total: usize) {
        self.messages.lock().unwrap().push(format!("{} tables", total));
    }

    fn update(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub fn author_table() -> Table {
    Table::new(
        "AO_AUTHOR",
        vec![
            Column::new("ID", SqlType::BigInt).primary_key().auto_increment(),
            Column::new("NAME", SqlType::VarChar).with_precision(100),
        ],
        vec![],
    )
}

pub fn book_table() -> Table {
    Table::new(
        "AO_BOOK",
        vec![
            Column::new("ID", SqlType::BigInt).primary_key().auto_increment(),
            Column::new("TITLE", SqlType::VarChar).with_precision(255),
            Column::new("AUTHOR_ID", SqlType::BigInt),
            Column::new("PRICE", SqlType::Decimal).with_precision(10).with_scale(2),
            Column::new("PUBLISHED", SqlType::Timestamp),
            Column::new("IN_PRINT", SqlType::Boolean),
        ],
        vec![ForeignKey::new(
            Some("fk_ao_book_author_id"),
            "AO_BOOK",
            "AUTHOR_ID",
            "AO_AUTHOR",
            "ID",
        )],
    )
}

pub fn author_rows() -> Vec<Vec<SqlValue>> {
    vec![
        vec![SqlValue::from(1i64), SqlValue::from("Frank Herbert")],
        vec![SqlValue::from(2i64), SqlValue::from("Ursula K. Le Guin")],
    ]
}

pub fn book_rows() -> Vec<Vec<SqlValue>> {
    let published = Utc.with_ymd_and_hms(1965, 8, 1, 12, 30, 0).unwrap()
        + chrono::Duration::milliseconds(250);
    vec![
        vec![
            SqlValue::from(1i64),
            SqlValue::from("Dune <first> & \"best\""),
            SqlValue::from(1i64),
            SqlValue::from(Decimal::new(1250, 2)),
            SqlValue::from(published),
            SqlValue::from(true),
        ],
        vec![
            SqlValue::from(2i64),
            SqlValue::from(""),
            SqlValue::from(2i64),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::from(false),
        ],
        vec![
            SqlValue::from(3i64),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::from(Decimal::new(-5, 1)),
            SqlValue::Null,
            SqlValue::Null,
        ],
    ]
}

/// A source database holding the library tables.
pub fn library(product: &str) -> MemoryDatabase {
    let db = MemoryDatabase::new(product);
    db.insert_table(author_table(), author_rows());
    db.insert_table(book_table(), book_rows());
    db
}

pub fn backup(database: &MemoryDatabase, monitor: Arc<RecordingMonitor>) -> Backup {
    Backup::new(database.clone(), BackupConfig::default()).with_monitor(monitor)
}

pub fn backup_with(database: &MemoryDatabase, options: BackupConfig) -> Backup {
    Backup::new(database.clone(), options).with_monitor(Arc::new(RecordingMonitor::default()))
}

/// Save `database` into an in-memory document.
pub async fn save(database: &MemoryDatabase) -> String {
    let mut output = Vec::new();
    backup(database, Arc::new(RecordingMonitor::default()))
        .save(&mut output)
        .await
        .unwrap();
    String::from_utf8(output).unwrap()
}

/// A document with one `data` element of `rows` integer rows for table `T`.
pub fn numbers_document(rows: usize) -> String {
    let mut doc = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<backup xmlns="http://www.atlassian.com/ao" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<table name="T"><column name="N" sqlType="-5" primaryKey="true"/></table>
<data tableName="T"><column name="N"/>
"#,
    );
    for n in 1..=rows {
        doc.push_str(&format!("<row><integer>{}</integer></row>\n", n));
    }
    doc.push_str("</data>\n</backup>\n");
    doc
}
