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

use serde::{Deserialize, Serialize};

/// Per-document hit count of a query. Saturates at `u16::MAX`.
pub type Score = u16;

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub score: Score,
    pub name: String,
}

/// Parameters of classic index construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassicIndexParameters {
    /// k-mer size
    pub term_size: u32,
    /// replace each k-mer by the smaller of itself and its reverse complement
    pub canonicalize: bool,
    /// number of Bloom hash functions
    pub num_hashes: u32,
    /// target false positive rate at the largest document
    pub false_positive_rate: f64,
    /// RAM bound for the batch row buffer, in bytes
    pub mem_bytes: u64,
    /// worker threads, 0 = all hardware threads
    pub num_threads: usize,
    /// reuse batch temporaries already present in the output directory
    pub continue_: bool,
    /// keep batch temporaries after a successful merge
    pub keep_temporary: bool,
}

impl Default for ClassicIndexParameters {
    fn default() -> Self {
        Self {
            term_size: 31,
            canonicalize: false,
            num_hashes: 1,
            false_positive_rate: 0.3,
            mem_bytes: 1 << 30,
            num_threads: 0,
            continue_: false,
            keep_temporary: false,
        }
    }
}

/// Parameters of compact index construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactIndexParameters {
    pub term_size: u32,
    pub canonicalize: bool,
    pub num_hashes: u32,
    pub false_positive_rate: f64,
    /// documents per page, 0 = ceil(sqrt(#documents))
    pub page_size: usize,
    pub mem_bytes: u64,
    pub num_threads: usize,
    pub continue_: bool,
    pub keep_temporary: bool,
}

impl Default for CompactIndexParameters {
    fn default() -> Self {
        Self {
            term_size: 31,
            canonicalize: false,
            num_hashes: 1,
            false_positive_rate: 0.3,
            page_size: 0,
            mem_bytes: 1 << 30,
            num_threads: 0,
            continue_: false,
            keep_temporary: false,
        }
    }
}

impl CompactIndexParameters {
    /// The classic parameters used for one page of a compact index. Page
    /// batches are always cleaned; the page indexes themselves are the
    /// compact builder's temporaries.
    pub(crate) fn classic(&self) -> ClassicIndexParameters {
        ClassicIndexParameters {
            term_size: self.term_size,
            canonicalize: self.canonicalize,
            num_hashes: self.num_hashes,
            false_positive_rate: self.false_positive_rate,
            mem_bytes: self.mem_bytes,
            num_threads: self.num_threads,
            continue_: self.continue_,
            keep_temporary: false,
        }
    }
}
