//! Shared fixtures: a small music catalogue and a recording storage.

#![allow(dead_code)]

use chainorm::prelude::*;
use chainorm::Row;
use std::sync::{Arc, Mutex};

/// Storage double that records every statement and answers queries with
/// canned rows.
#[derive(Default)]
pub struct Recording {
    rows: Vec<Vec<Value>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl Recording {
    pub fn returning(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows,
            log: Mutex::default(),
        }
    }

    pub fn log(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.log().into_iter().map(|(sql, _)| sql).collect()
    }
}

impl Storage for Recording {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
        Ok(self.rows.iter().cloned().map(Row::from_values).collect())
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
        Ok(1)
    }
}

/// Artist -< CD -< Track, CD >- Producer.
pub fn catalogue(config: SchemaConfig) -> Arc<Schema> {
    Schema::builder()
        .config(config)
        .add_source(
            ResultSource::new("Artist")
                .table("artist")
                .columns(["artistid", "name", "rank"])
                .primary_key(["artistid"]),
        )
        .and_then(|b| {
            b.add_source(
                ResultSource::new("CD")
                    .table("cd")
                    .columns(["cdid", "artist", "title", "year", "producer"])
                    .primary_key(["cdid"]),
            )
        })
        .and_then(|b| {
            b.add_source(
                ResultSource::new("Track")
                    .table("track")
                    .columns(["trackid", "cd", "position", "title"])
                    .primary_key(["trackid"]),
            )
        })
        .and_then(|b| {
            b.add_source(
                ResultSource::new("Producer")
                    .table("producer")
                    .columns(["producerid", "name"])
                    .primary_key(["producerid"]),
            )
        })
        .and_then(|b| b.has_many_on("Artist", "cds", "CD", "artist"))
        .and_then(|b| b.has_many_on("CD", "tracks", "Track", "cd"))
        .and_then(|b| b.belongs_to("CD", "artist", "Artist"))
        .and_then(|b| b.belongs_to("CD", "producer", "Producer"))
        .and_then(|b| b.belongs_to("Track", "cd", "CD"))
        .expect("catalogue schema")
        .build()
}

pub fn default_catalogue() -> Arc<Schema> {
    catalogue(SchemaConfig::new())
}
