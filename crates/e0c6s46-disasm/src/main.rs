use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use e0c6s46_rs::disasm::fmt_decoded;
use e0c6s46_rs::il::IlBuffer;
use e0c6s46_rs::{Arch, ArchConfig};

use e0c6s46_disasm::{analyze_entries, build_report, clamp_words, is_mapped, load_raw_bin, read_word, Block, EdgeOut, FunctionOut, Image};

#[derive(Parser, Debug)]
#[command(author, version, about = "E0C6S46 disassembler CLI", long_about=None)]
struct Cli {
    /// Architecture config (JSON); defaults apply to missing keys
    #[arg(long, value_name = "FILE")]
    config: Option<String>,
    /// Load address for the binary, in bytes (must be even)
    #[arg(long, default_value_t = 0u32)]
    base: u32,
    /// Skip N bytes at start of file before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Input binary path
    #[arg(value_name = "BINFILE")]
    input: String,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    /// Subcommand
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded segments
    Sections,
    /// Disassemble a byte range [start, end)
    Range {
        /// Start address (hex or dec)
        start: String,
        /// End address (hex or dec, exclusive)
        end: String,
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
    /// List the PSET records found by the pre-pass
    Psets,
    /// Print the lifted IL for a byte range [start, end)
    Lift {
        start: String,
        end: String,
    },
    /// Analyze code graph from entry points
    Analyze {
        /// Entry addresses (hex or dec). Repeat flag to add multiple entries.
        #[arg(long = "entry", value_name = "ADDR", num_args = 1.., required = false)]
        entries: Vec<String>,
        /// Maximum instructions to decode before stopping
        #[arg(long, default_value_t = 100_000usize)]
        max_instr: usize,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Emit a linear disassembly listing of analyzed code (text format only)
        #[arg(long)]
        listing: bool,
        /// Show instruction bytes in listing
        #[arg(long)]
        show_bytes: bool,
        /// Import labels from JSON (Vec<{ addr, name }>)
        #[arg(long, value_name = "FILE")]
        labels_in: Option<String>,
        /// Export labels to JSON (Vec<{ addr, name }>)
        #[arg(long, value_name = "FILE")]
        labels_out: Option<String>,
        /// Write analysis output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

/// Byte address from the command line to a word address.
fn parse_word_addr(s: &str) -> Result<u32> {
    let a = parse_u32(s)?;
    anyhow::ensure!(a % 2 == 0, "address {a:#x} is not word aligned");
    Ok(a / 2)
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Clone, serde::Serialize)]
struct BlockOut { start: u32, end: u32, insns: Vec<String> }

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LabelKV { addr: u32, name: String }

#[derive(Debug, Clone, serde::Serialize)]
struct ReportWithLabels {
    entries: Vec<u32>,
    blocks: Vec<BlockOut>,
    edges: Vec<EdgeOut>,
    functions: Vec<FunctionOut>,
    labels: Vec<LabelKV>,
}

/// One listing line for the word at `pc`, addressed in bytes.
fn render_line(img: &Image, arch: &Arch, pc: u32, show_bytes: bool) -> Option<String> {
    let bytes = read_word(img, pc)?;
    let d = arch.decode(&bytes, pc).ok()?;
    let text = if d.is_unknown() {
        format!(".word {:#05x}", d.word.value())
    } else {
        fmt_decoded(&d)
    };
    let addr = pc * 2;
    Some(if show_bytes {
        format!("{addr:#06x}: {:02x} {:02x}   {text}", bytes[0], bytes[1])
    } else {
        format!("{addr:#06x}: {text}")
    })
}

fn write_labels(path: &str, labels: &BTreeMap<u32, String>) -> Result<()> {
    let arr: Vec<LabelKV> = labels.iter().map(|(k, v)| LabelKV { addr: *k, name: v.clone() }).collect();
    std::fs::write(path, serde_json::to_string_pretty(&arr)?)?;
    Ok(())
}

fn emit(out: Option<String>, text: &str) -> Result<()> {
    if let Some(path) = out { std::fs::write(path, text)?; } else { print!("{text}"); }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => ArchConfig::load(Path::new(path))?,
        None => ArchConfig::default(),
    };
    anyhow::ensure!(cli.base % 2 == 0, "--base must be word aligned");
    let mut img = load_raw_bin(Path::new(&cli.input), cli.base / 2, cli.skip, cli.len)?;
    let cut = clamp_words(&mut img, cfg.rom_words);
    if cut > 0 {
        warn!(bytes = cut, rom_words = cfg.rom_words, "image extends past program memory; truncated");
    }
    anyhow::ensure!(!img.segments.is_empty(), "image lies entirely outside program memory");
    let arch = Arch::with_image(cfg, &img);
    info!(records = arch.pages().len(), "image loaded");

    match cli.cmd {
        Command::Sections => {
            println!("{:<10} {:<8} {:<8} {:<6} {:<6}", "name", "start", "end", "perms", "kind");
            for s in &img.segments {
                let (start, end) = (s.base * 2, s.end() * 2);
                println!("{:<10} {start:#06x}   {end:#06x}   {:<6} {:<6}", s.name, s.perms, s.kind);
            }
        }
        Command::Range { start, end, show_bytes, out } => {
            let start = parse_word_addr(&start)?;
            let end = parse_word_addr(&end)?;
            anyhow::ensure!(end >= start, "end must be >= start");
            let mut buf = String::new();
            for pc in start..end {
                match render_line(&img, &arch, pc, show_bytes) {
                    Some(line) => { let _ = writeln!(buf, "{line}"); }
                    None => { let _ = writeln!(buf, "{:#06x}: <oob>", pc * 2); break; }
                }
            }
            emit(out, &buf)?;
        }
        Command::Psets => {
            for r in arch.pages().iter() {
                println!("{:#06x}: PSET {:#04x}  (bank {}, page {:#x})", r.address * 2, r.page_value, r.bank(), r.page());
            }
        }
        Command::Lift { start, end } => {
            let start = parse_word_addr(&start)?;
            let end = parse_word_addr(&end)?;
            anyhow::ensure!(end >= start, "end must be >= start");
            let mut il = IlBuffer::new();
            for pc in start..end {
                let Some(line) = render_line(&img, &arch, pc, false) else { break };
                println!("{line}");
                let Some(bytes) = read_word(&img, pc) else { break };
                il.clear();
                arch.instruction_il(&bytes, pc, &mut il)?;
                for s in il.lines() { println!("    {s}"); }
            }
        }
        Command::Analyze { entries, max_instr, format, listing, show_bytes, labels_in, labels_out, out } => {
            let mut seeds: Vec<u32> = if entries.is_empty() {
                let ep = arch.config().entry_point;
                if is_mapped(&img, ep) {
                    vec![ep]
                } else {
                    img.segments.first().map(|s| s.base).into_iter().collect()
                }
            } else {
                entries.iter().map(|e| parse_word_addr(e)).collect::<Result<_>>()?
            };
            seeds.sort_unstable();
            seeds.dedup();
            let an = analyze_entries(&img, &arch, &seeds, max_instr);
            let report = build_report(&an, &seeds);

            // Labels keyed by byte address: imported first, then generated.
            let mut labels: BTreeMap<u32, String> = BTreeMap::new();
            if let Some(path) = &labels_in {
                let txt = std::fs::read_to_string(path)?;
                for kv in serde_json::from_str::<Vec<LabelKV>>(&txt)? { labels.insert(kv.addr, kv.name); }
            }
            for f in &report.functions { labels.entry(f.entry).or_insert_with(|| format!("sub_{:04x}", f.entry)); }
            for b in &report.blocks { labels.entry(b.start).or_insert_with(|| format!("loc_{:04x}", b.start)); }
            if let Some(path) = &labels_out { write_labels(path, &labels)?; }

            let mut buf = String::new();
            match format {
                OutputFormat::Json => {
                    let blocks = enrich_blocks_with_mnemonics(&img, &arch, &report.blocks, show_bytes);
                    let lbl_vec = labels.iter().map(|(k, v)| LabelKV { addr: *k, name: v.clone() }).collect();
                    let full = ReportWithLabels {
                        entries: report.entries,
                        blocks,
                        edges: report.edges,
                        functions: report.functions,
                        labels: lbl_vec,
                    };
                    buf = serde_json::to_string_pretty(&full)?;
                    buf.push('\n');
                }
                OutputFormat::Text => {
                    let _ = writeln!(buf, "Analysis summary:");
                    let _ = writeln!(buf, "  entries   : {:?}", report.entries.iter().map(|a| format!("{a:#06x}")).collect::<Vec<_>>());
                    let _ = writeln!(buf, "  insts     : {}", an.visited.len());
                    let _ = writeln!(buf, "  blocks    : {}", report.blocks.len());
                    let _ = writeln!(buf, "  edges     : {}", report.edges.len());
                    let _ = writeln!(buf, "  functions : {}", report.functions.len());
                    let _ = writeln!(buf, "  unknown   : {}", an.unknown.len());
                    let _ = writeln!(buf, "Edges:");
                    for e in &report.edges {
                        let _ = writeln!(buf, "  {:#06x} -> {:#06x} ({})", e.from, e.to, e.kind);
                    }
                    if listing {
                        let _ = writeln!(buf, "\nListing (analyzed PCs):");
                        for &pc in &an.visited {
                            if let Some(lbl) = labels.get(&(pc * 2)) {
                                let _ = writeln!(buf, "{:#06x} <{lbl}>:", pc * 2);
                            }
                            if let Some(line) = render_line(&img, &arch, pc, show_bytes) {
                                let _ = writeln!(buf, "  {line}");
                            }
                        }
                    }
                }
            }
            emit(out, &buf)?;
        }
    }

    Ok(())
}

fn enrich_blocks_with_mnemonics(img: &Image, arch: &Arch, blocks: &[Block], show_bytes: bool) -> Vec<BlockOut> {
    blocks
        .iter()
        .map(|b| {
            let insns = (b.start / 2..b.end / 2).filter_map(|pc| render_line(img, arch, pc, show_bytes)).collect();
            BlockOut { start: b.start, end: b.end, insns }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use e0c6s46_disasm::Segment;

    fn image(words: &[u16]) -> Image {
        let bytes = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        Image { segments: vec![Segment { name: "rom".into(), base: 0x100, bytes, perms: "r-x", kind: "raw" }] }
    }

    #[test]
    fn parse_u32_hex_and_dec() {
        assert_eq!(parse_u32("0x10").unwrap(), 0x10);
        assert_eq!(parse_u32("16").unwrap(), 16);
        assert!(parse_u32("zz").is_err());
    }

    #[test]
    fn byte_addresses_map_to_words() {
        assert_eq!(parse_word_addr("0x200").unwrap(), 0x100);
        assert!(parse_word_addr("0x201").is_err());
    }

    #[test]
    fn range_lines_use_byte_addresses() {
        let img = image(&[0xE41, 0x023, 0xED0]);
        let arch = Arch::with_image(ArchConfig::default(), &img);
        assert_eq!(render_line(&img, &arch, 0x101, false).unwrap(), "0x0202: JP 0x246");
        assert_eq!(render_line(&img, &arch, 0x101, true).unwrap(), "0x0202: 00 23   JP 0x246");
        assert_eq!(render_line(&img, &arch, 0x102, false).unwrap(), "0x0204: .word 0xed0");
        assert!(render_line(&img, &arch, 0x103, false).is_none());
    }
}
