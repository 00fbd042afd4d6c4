// Copyright 2025 The cobs-rs Authors
// Derived from bingmann/cobs (https://github.com/bingmann/cobs)
// Copyright 2018 Timo Bingmann, Florian Gauger
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compact bit-sliced signature index for approximate k-mer membership
//! search: a Bloom-filter matrix per corpus, stored row-major, constructed
//! in RAM-bounded batches and queried through one read-only memory mapping.

pub mod construct;
pub mod docs;
pub mod error;
pub mod fmt;
pub mod hashing;
pub mod kmer;
pub mod search;
pub mod timer;
pub mod types;

pub use crate::construct::{
    classic_construct, classic_construct_random, compact_combine, compact_construct,
};
pub use crate::docs::{DocumentEntry, DocumentList, FileType};
pub use crate::error::{Error, Result};
pub use crate::search::{IndexFile, IndexSearcher};
pub use crate::timer::Timer;
pub use crate::types::{ClassicIndexParameters, CompactIndexParameters, Score, ScoredDocument};

/// Open an index file of either variant, ready for queries.
pub fn open_index(path: impl AsRef<std::path::Path>) -> Result<IndexFile> {
    IndexFile::open(path.as_ref())
}
