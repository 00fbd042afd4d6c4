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

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use xxhash_rust::xxh64::xxh64;

use cobs_rs::kmer::{canonicalize_kmer, is_valid_kmer, random_sequence_rng, BASEPAIR_MAP};
use cobs_rs::{
    classic_construct, classic_construct_random, compact_combine, compact_construct, open_index,
    ClassicIndexParameters, CompactIndexParameters, DocumentList, Error, FileType, IndexSearcher,
    Timer,
};

#[derive(Parser, Debug)]
#[command(name = "cobs", about = "Compact bit-sliced signature index for k-mer search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List documents under a path with their k-mer counts
    #[command(name = "doc_list")]
    DocList {
        /// path to documents
        path: PathBuf,
        /// filter documents by file type (any, text, fasta)
        #[arg(short = 'T', long, default_value = "any")]
        file_type: String,
        /// term size (k-mer size)
        #[arg(short = 'k', long, default_value_t = 31)]
        term_size: u32,
    },
    /// Dump the k-mers of every document to stdout
    #[command(name = "doc_dump")]
    DocDump {
        /// path to documents
        path: PathBuf,
        /// filter documents by file type (any, text, fasta)
        #[arg(short = 'T', long, default_value = "any")]
        file_type: String,
        /// term size (k-mer size)
        #[arg(short = 'k', long, default_value_t = 31)]
        term_size: u32,
    },
    /// Construct a classic index from a directory of documents
    #[command(name = "classic_construct")]
    ClassicConstruct {
        /// path to the input directory
        in_dir: PathBuf,
        /// path to the output directory
        out_dir: PathBuf,
        /// filter input documents by file type (any, text, fasta)
        #[arg(short = 't', long, default_value = "any")]
        file_type: String,
        /// memory in bytes to use for the row buffer
        #[arg(short = 'm', long, default_value_t = 1 << 30)]
        mem_bytes: u64,
        /// number of hash functions
        #[arg(long, default_value_t = 1)]
        num_hashes: u32,
        /// false positive rate
        #[arg(short = 'f', long, default_value_t = 0.3)]
        false_positive_rate: f64,
        /// term size (k-mer size)
        #[arg(short = 'k', long, default_value_t = 31)]
        term_size: u32,
        /// canonicalize DNA k-mers
        #[arg(short = 'c', long)]
        canonicalize: bool,
        /// erase the output directory if it exists
        #[arg(short = 'C', long)]
        clobber: bool,
        /// continue in an existing output directory
        #[arg(long = "continue")]
        continue_: bool,
        /// number of threads, 0 = all hardware threads
        #[arg(short = 'T', long, default_value_t = 0)]
        threads: usize,
        /// keep temporary batch files after construction
        #[arg(long)]
        keep_temporary: bool,
    },
    /// Construct a classic index of random documents (benchmark corpus)
    #[command(name = "classic_construct_random")]
    ClassicConstructRandom {
        /// path to the output file
        out_file: PathBuf,
        /// number of signature bits (vertical size)
        #[arg(short = 's', long, default_value_t = 2 * 1024 * 1024)]
        signature_size: u64,
        /// number of random documents in the index
        #[arg(short = 'n', long, default_value_t = 10_000)]
        num_documents: u32,
        /// number of random 31-mers per document
        #[arg(short = 'm', long, default_value_t = 1_000_000)]
        document_size: u32,
        /// number of hash functions
        #[arg(long, default_value_t = 1)]
        num_hashes: u32,
        /// random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Construct a compact index from a directory of documents
    #[command(name = "compact_construct")]
    CompactConstruct {
        /// path to the input directory
        in_dir: PathBuf,
        /// path to the output directory
        out_dir: PathBuf,
        /// memory in bytes to use for the row buffer
        #[arg(short = 'm', long, default_value_t = 1 << 30)]
        mem_bytes: u64,
        /// number of hash functions
        #[arg(long, default_value_t = 1)]
        num_hashes: u32,
        /// false positive rate
        #[arg(short = 'f', long, default_value_t = 0.3)]
        false_positive_rate: f64,
        /// page size of the compact index, 0 = sqrt(#documents)
        #[arg(short = 'p', long, default_value_t = 0)]
        page_size: usize,
        /// term size (k-mer size)
        #[arg(short = 'k', long, default_value_t = 31)]
        term_size: u32,
        /// canonicalize DNA k-mers
        #[arg(short = 'c', long)]
        canonicalize: bool,
        /// erase the output directory if it exists
        #[arg(short = 'C', long)]
        clobber: bool,
        /// continue in an existing output directory
        #[arg(long = "continue")]
        continue_: bool,
        /// number of threads, 0 = all hardware threads
        #[arg(short = 'T', long, default_value_t = 0)]
        threads: usize,
        /// keep temporary page indexes after construction
        #[arg(long)]
        keep_temporary: bool,
    },
    /// Combine a directory of classic page indexes into one compact index
    #[command(name = "compact_construct_combine")]
    CompactConstructCombine {
        /// path to the input directory of classic indexes
        in_dir: PathBuf,
        /// path to the output file
        out_file: PathBuf,
        /// page size of the compact index
        #[arg(short = 'p', long, default_value_t = 8192)]
        page_size: u32,
    },
    /// Query an index for a DNA sequence
    #[command(name = "query")]
    Query {
        /// path to the index file
        in_file: PathBuf,
        /// the DNA sequence to search for
        query: String,
        /// number of results to return, 0 = all
        #[arg(long, default_value_t = 100)]
        num_results: usize,
        /// emit results as NDJSON
        #[arg(long)]
        json: bool,
    },
    /// Print signature parameters for a document count
    #[command(name = "print_parameters")]
    PrintParameters {
        /// number of hash functions
        #[arg(long, default_value_t = 1)]
        num_hashes: u32,
        /// false positive rate
        #[arg(short = 'f', long, default_value_t = 0.3)]
        false_positive_rate: f64,
        /// number of elements to be inserted into the index
        #[arg(short = 'n', long, default_value_t = 0)]
        num_elements: u64,
    },
    /// Print the canonical k-mers of a DNA sequence
    #[command(name = "print_kmers")]
    PrintKmers {
        /// the DNA sequence to split into k-mers
        query: String,
        /// k-mer size
        #[arg(short = 'k', long, default_value_t = 31)]
        kmer_size: usize,
    },
    /// Print the base-pair complement map
    #[command(name = "print_basepair_map")]
    PrintBasepairMap,
    /// Sample positive and random negative queries from a corpus
    #[command(name = "generate_queries")]
    GenerateQueries {
        /// path to base documents
        path: PathBuf,
        /// filter documents by file type (any, text, fasta)
        #[arg(short = 't', long, default_value = "any")]
        file_type: String,
        /// term size (k-mer size)
        #[arg(short = 'k', long, default_value_t = 31)]
        term_size: u32,
        /// pick this number of existing positive queries
        #[arg(short = 'p', long, default_value_t = 0)]
        positive: usize,
        /// construct this number of random non-existing negative queries
        #[arg(short = 'n', long, default_value_t = 0)]
        negative: usize,
        /// check that negative queries are absent from the documents (slow)
        #[arg(short = 'N', long)]
        true_negative: bool,
        /// extend positive terms with random bases to this length
        #[arg(short = 's', long, default_value_t = 0)]
        size: usize,
        /// random seed
        #[arg(short = 'S', long)]
        seed: Option<u64>,
        /// output file path, stdout when unset
        #[arg(short = 'o', long)]
        out_file: Option<PathBuf>,
    },
    /// Run random queries against an index and report timings
    #[command(name = "benchmark_fpr")]
    BenchmarkFpr {
        /// path to the index file
        in_file: PathBuf,
        /// number of k-mers per query
        #[arg(short = 'k', long, default_value_t = 1000)]
        num_kmers: usize,
        /// number of random queries to run
        #[arg(short = 'q', long, default_value_t = 10_000)]
        queries: usize,
        /// number of random warmup queries to run
        #[arg(short = 'w', long, default_value_t = 100)]
        warmup: usize,
        /// report the per-score false positive distribution
        #[arg(short = 'd', long)]
        dist: bool,
        /// random seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    if let Err(e) = run() {
        eprintln!("EXCEPTION: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    match Cli::parse().command {
        Command::DocList {
            path,
            file_type,
            term_size,
        } => {
            let list = DocumentList::scan(&path, FileType::parse(&file_type)?)?;
            print_document_list(&list, term_size as usize);
        }
        Command::DocDump {
            path,
            file_type,
            term_size,
        } => {
            let list = DocumentList::scan(&path, FileType::parse(&file_type)?)?;
            eprintln!("Found {} documents.", list.len());
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for (i, doc) in list.iter().enumerate() {
                eprintln!("document[{}] : {} : {}", i, doc.path.display(), doc.name);
                let mut count = 0usize;
                doc.process_terms(term_size as usize, |term| {
                    out.write_all(term).and_then(|_| out.write_all(b"\n")).ok();
                    count += 1;
                })?;
                eprintln!("document[{}] : {} terms.", i, count);
            }
        }
        Command::ClassicConstruct {
            in_dir,
            out_dir,
            file_type,
            mem_bytes,
            num_hashes,
            false_positive_rate,
            term_size,
            canonicalize,
            clobber,
            continue_,
            threads,
            keep_temporary,
        } => {
            check_out_dir(&out_dir, clobber, continue_)?;
            let list = DocumentList::scan(&in_dir, FileType::parse(&file_type)?)?;
            print_document_list(&list, term_size as usize);
            let params = ClassicIndexParameters {
                term_size,
                canonicalize,
                num_hashes,
                false_positive_rate,
                mem_bytes,
                num_threads: threads,
                continue_,
                keep_temporary,
            };
            let index = classic_construct(list.as_slice(), &out_dir, &params)?;
            println!("wrote index: {}", index.display());
        }
        Command::ClassicConstructRandom {
            out_file,
            signature_size,
            num_documents,
            document_size,
            num_hashes,
            seed,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            eprintln!(
                "Constructing random index, num_documents = {}, signature_size = {}, seed = {}",
                num_documents, signature_size, seed
            );
            classic_construct_random(
                &out_file,
                signature_size,
                num_documents,
                document_size,
                num_hashes,
                seed,
            )?;
        }
        Command::CompactConstruct {
            in_dir,
            out_dir,
            mem_bytes,
            num_hashes,
            false_positive_rate,
            page_size,
            term_size,
            canonicalize,
            clobber,
            continue_,
            threads,
            keep_temporary,
        } => {
            check_out_dir(&out_dir, clobber, continue_)?;
            let params = CompactIndexParameters {
                term_size,
                canonicalize,
                num_hashes,
                false_positive_rate,
                page_size,
                mem_bytes,
                num_threads: threads,
                continue_,
                keep_temporary,
            };
            let index = compact_construct(&in_dir, &out_dir, &params)?;
            println!("wrote index: {}", index.display());
        }
        Command::CompactConstructCombine {
            in_dir,
            out_file,
            page_size,
        } => {
            let index = compact_combine(&in_dir, &out_file, page_size)?;
            println!("wrote index: {}", index.display());
        }
        Command::Query {
            in_file,
            query,
            num_results,
            json,
        } => {
            let file = open_index(&in_file)?;
            let searcher = IndexSearcher::new(&file);
            let mut timer = Timer::new();
            let results = searcher.search_timed(&query, num_results, &mut timer)?;
            if json {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                for r in &results {
                    serde_json::to_writer(&mut out, r)?;
                    out.write_all(b"\n")?;
                }
            } else {
                for r in &results {
                    println!("{} - {}", r.name, r.score);
                }
            }
            eprintln!("timer: {}", timer);
        }
        Command::PrintParameters {
            num_hashes,
            false_positive_rate,
            num_elements,
        } => {
            if num_elements == 0 {
                println!(
                    "{}",
                    cobs_rs::hashing::calc_signature_size_ratio(num_hashes, false_positive_rate)
                );
            } else {
                let signature_size = cobs_rs::hashing::calc_signature_size(
                    num_elements,
                    num_hashes,
                    false_positive_rate,
                )?;
                println!("signature_size = {}", signature_size);
                println!("signature_bytes = {}", signature_size / 8);
            }
        }
        Command::PrintKmers { query, kmer_size } => {
            let query = query.to_ascii_uppercase();
            let bytes = query.as_bytes();
            if bytes.len() < kmer_size {
                return Err(Error::InvalidArgument(format!(
                    "query of length {} is shorter than the k-mer size {}",
                    bytes.len(),
                    kmer_size
                ))
                .into());
            }
            let mut scratch = vec![0u8; kmer_size];
            for window in bytes.windows(kmer_size) {
                if !is_valid_kmer(window) {
                    continue;
                }
                let canonical = canonicalize_kmer(window, &mut scratch);
                println!("{}", std::str::from_utf8(canonical)?);
            }
        }
        Command::PrintBasepairMap => {
            for (i, b) in BASEPAIR_MAP.iter().enumerate() {
                print!("{},", b);
                if i % 16 == 15 {
                    println!();
                }
            }
        }
        Command::GenerateQueries {
            path,
            file_type,
            term_size,
            positive,
            negative,
            true_negative,
            size,
            seed,
            out_file,
        } => {
            generate_queries(
                &path,
                FileType::parse(&file_type)?,
                term_size as usize,
                positive,
                negative,
                true_negative,
                size,
                seed.unwrap_or_else(rand::random),
                out_file.as_deref(),
            )?;
        }
        Command::BenchmarkFpr {
            in_file,
            num_kmers,
            queries,
            warmup,
            dist,
            seed,
        } => {
            benchmark_fpr(
                &in_file,
                num_kmers,
                queries,
                warmup,
                dist,
                seed.unwrap_or_else(rand::random),
            )?;
        }
    }
    Ok(())
}

fn check_out_dir(out_dir: &Path, clobber: bool, continue_: bool) -> Result<()> {
    if out_dir.exists() {
        if clobber {
            fs::remove_dir_all(out_dir)?;
        } else if !continue_ {
            return Err(Error::AlreadyExists(format!(
                "output directory {} exists, will not overwrite without --clobber",
                out_dir.display()
            ))
            .into());
        }
    }
    Ok(())
}

fn print_document_list(list: &DocumentList, term_size: usize) {
    println!("--- document list ({} entries) ---", list.len());
    let mut max_kmers = 0usize;
    let mut total_kmers = 0usize;
    for (i, doc) in list.iter().enumerate() {
        let num_terms = doc.num_terms(term_size);
        println!(
            "document[{}] size {} {}-mers {} : {} : {}",
            i,
            doc.size,
            term_size,
            num_terms,
            doc.path.display(),
            doc.name
        );
        max_kmers = max_kmers.max(num_terms);
        total_kmers += num_terms;
    }
    println!("--- end of document list ({} entries) ---", list.len());
    println!("documents: {}", list.len());
    println!("maximum {}-mers: {}", term_size, max_kmers);
    if !list.is_empty() {
        println!(
            "average {}-mers: {}",
            term_size,
            total_kmers / list.len()
        );
    }
    println!("total {}-mers: {}", term_size, total_kmers);
}

#[allow(clippy::too_many_arguments)]
fn generate_queries(
    path: &Path,
    file_type: FileType,
    k: usize,
    num_positive: usize,
    num_negative: usize,
    true_negative: bool,
    size: usize,
    seed: u64,
    out_file: Option<&Path>,
) -> Result<()> {
    let list = DocumentList::scan(path, file_type)?;
    let size = size.max(k);
    let mut rng = StdRng::seed_from_u64(seed);

    // exact term counts, so sampled indices always land on a real term
    let mut counts = Vec::with_capacity(list.len());
    for doc in list.iter() {
        let mut n = 0usize;
        doc.process_terms(k, |_| n += 1)?;
        counts.push(n);
    }
    let total: usize = counts.iter().sum();
    eprintln!(
        "Given {} documents containing {} {}-mer terms",
        list.len(),
        total,
        k
    );
    if num_positive > total {
        return Err(Error::InvalidArgument(format!(
            "cannot sample {} positive queries from {} terms",
            num_positive, total
        ))
        .into());
    }

    let mut picked: HashSet<usize> = HashSet::new();
    while picked.len() < num_positive {
        picked.insert(rng.gen_range(0..total));
    }
    let mut targets: Vec<usize> = picked.into_iter().collect();
    targets.sort_unstable();

    let mut positives: Vec<String> = Vec::with_capacity(num_positive);
    let mut next_target = 0usize;
    let mut global = 0usize;
    for (doc, count) in list.iter().zip(&counts) {
        let doc_end = global + count;
        if next_target < targets.len() && targets[next_target] < doc_end {
            let begin = global;
            doc.process_terms(k, |term| {
                if next_target < targets.len() && targets[next_target] == global {
                    let mut q = String::from_utf8(term.to_vec()).unwrap_or_default();
                    q.push_str(&random_sequence_rng(size - k, &mut rng));
                    positives.push(q);
                    next_target += 1;
                }
                global += 1;
            })?;
            debug_assert_eq!(global, begin + count);
        } else {
            global = doc_end;
        }
    }

    let corpus_hashes: Option<HashSet<u64>> = if true_negative {
        let mut set = HashSet::new();
        for doc in list.iter() {
            doc.process_terms(k, |term| {
                set.insert(xxh64(term, 0));
            })?;
        }
        Some(set)
    } else {
        None
    };

    let mut negatives: Vec<String> = Vec::with_capacity(num_negative);
    while negatives.len() < num_negative {
        let q = random_sequence_rng(size, &mut rng);
        if let Some(set) = &corpus_hashes {
            let hit = q
                .as_bytes()
                .windows(k)
                .any(|w| set.contains(&xxh64(w, 0)));
            if hit {
                continue;
            }
        }
        negatives.push(q);
    }

    let mut out: Box<dyn Write> = match out_file {
        Some(p) => Box::new(fs::File::create(p)?),
        None => Box::new(std::io::stdout()),
    };
    for q in positives.iter().chain(negatives.iter()) {
        writeln!(out, "{}", q)?;
    }
    Ok(())
}

fn benchmark_fpr(
    in_file: &Path,
    num_kmers: usize,
    num_queries: usize,
    num_warmup: usize,
    dist: bool,
    seed: u64,
) -> Result<()> {
    let file = open_index(in_file)?;
    let k = file.term_size() as usize;
    let searcher = IndexSearcher::new(&file);
    let mut rng = StdRng::seed_from_u64(seed);

    let query_len = num_kmers + k - 1;
    for _ in 0..num_warmup {
        let q = random_sequence_rng(query_len, &mut rng);
        searcher.search(&q, 0)?;
    }

    let mut timer = Timer::new();
    let mut counts: BTreeMap<u16, u64> = BTreeMap::new();
    let mut num_results = 0usize;
    for _ in 0..num_queries {
        let q = random_sequence_rng(query_len, &mut rng);
        let results = searcher.search_timed(&q, 0, &mut timer)?;
        num_results = results.len();
        if dist {
            for r in results {
                *counts.entry(r.score).or_default() += 1;
            }
        }
    }

    println!(
        "RESULT name=benchmark index={} kmer_queries={} queries={} warmup={} results={} \
         t_hashes={:.6} t_io={:.6} t_and={:.6} t_add={:.6} t_sort={:.6}",
        in_file.display(),
        num_kmers,
        num_queries,
        num_warmup,
        num_results,
        timer.get("hashes").as_secs_f64(),
        timer.get("io").as_secs_f64(),
        timer.get("and rows").as_secs_f64(),
        timer.get("add rows").as_secs_f64(),
        timer.get("sort results").as_secs_f64(),
    );
    if dist {
        for (score, count) in counts {
            println!("RESULT name=benchmark_fpr fpr={} dist={}", score, count);
        }
    }
    Ok(())
}
