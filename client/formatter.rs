use super::session::Reply;
use crate::rtree::algorithms::debug::TreeStats;
use crate::rtree::node::LeafEntry;
use crate::rtree::Neighbor;
use crate::storage::import::ImportSummary;
use colored::*;

pub struct OutputFormatter;

impl OutputFormatter {
    pub fn format_reply(reply: &Reply) -> String {
        match reply {
            Reply::Inserted { handle, logged } => {
                if *logged {
                    format!("{} ({})", "OK".green(), handle)
                } else {
                    format!(
                        "{} ({}) {}",
                        "OK".green(),
                        handle,
                        "index log write failed".yellow()
                    )
                }
            }
            Reply::Deleted(entry) => {
                format!("{} {}", "Deleted".green(), Self::format_entry(entry))
            }
            Reply::NotFound => "(not found)".yellow().to_string(),
            Reply::Entries(entries) => Self::format_entries(entries),
            Reply::Neighbors(neighbors) => Self::format_neighbors(neighbors),
            Reply::Record(handle, record) => format!(
                "{}: id={} lat={} lon={}",
                handle.to_string().cyan(),
                record.id,
                record.lat,
                record.lon
            ),
            Reply::Imported(summary) => Self::format_import(summary),
            Reply::Stats(stats) => Self::format_stats(stats),
            Reply::Healthy => "OK, all invariants hold".green().to_string(),
            Reply::Text(text) => text.trim_end().to_string(),
            Reply::Help => Self::format_help_message(),
            Reply::Quit => "Bye".to_string(),
        }
    }

    pub fn format_error(err: &str) -> String {
        format!("(error) {}", err.red())
    }

    fn format_entry(entry: &LeafEntry) -> String {
        entry.to_string()
    }

    fn format_entries(entries: &[LeafEntry]) -> String {
        if entries.is_empty() {
            return "(empty result)".yellow().to_string();
        }
        let mut result = String::new();
        for (i, entry) in entries.iter().enumerate() {
            result.push_str(&format!(
                "{}) {}\n",
                (i + 1).to_string().blue(),
                Self::format_entry(entry)
            ));
        }
        result.push_str(&format!("({} entries)", entries.len()));
        result
    }

    fn format_neighbors(neighbors: &[Neighbor]) -> String {
        if neighbors.is_empty() {
            return "(empty result)".yellow().to_string();
        }
        let mut result = String::new();
        for (i, neighbor) in neighbors.iter().enumerate() {
            result.push_str(&format!(
                "{}) {} distance={}\n",
                (i + 1).to_string().blue(),
                Self::format_entry(&neighbor.entry),
                format!("{:.6}", neighbor.distance).cyan()
            ));
        }
        result.trim_end().to_string()
    }

    fn format_import(summary: &ImportSummary) -> String {
        format!(
            "{} {} records ({} skipped, {} rejected), {} data blocks",
            "Imported".green(),
            summary.imported.to_string().cyan(),
            summary.skipped,
            summary.rejected,
            summary.header.block_count
        )
    }

    fn format_stats(stats: &TreeStats) -> String {
        format!(
            "records: {}\nnodes:   {}\nleaves:  {}\ndepth:   {}",
            stats.records.to_string().cyan(),
            stats.nodes.to_string().cyan(),
            stats.leaves.to_string().cyan(),
            stats.depth.to_string().cyan()
        )
    }

    pub fn format_prompt(records: usize) -> String {
        format!("{}[{}]> ", "geostar".blue(), records.to_string().blue())
    }

    pub fn format_welcome_message(data_file: &str, records: usize) -> String {
        format!(
            "Data file {} ({} records indexed)",
            data_file.cyan(),
            records.to_string().green()
        )
    }

    pub fn format_help_message() -> String {
        let help = r#"
Available commands:
  INSERT block slot minx miny maxx maxy  - Index a record handle under an MBR
  DELETE minx miny maxx maxy             - Delete one entry with exactly this MBR
  RANGE minx miny maxx maxy              - Entries intersecting the rectangle
  KNN x y k                              - k nearest entries to a point
  SKYLINE                                - Entries not dominated on any coordinate
  IMPORT path                            - Load GeoJSON points into a new data file
  GET block slot                         - Read a record from the data file
  STATS                                  - Tree size and depth
  CHECK                                  - Verify structural invariants
  DUMP [JSON]                            - Print the tree structure
  HELP                                   - Show this help message
  QUIT                                   - Flush the index log and exit

Use Ctrl+D to exit interactive mode.
"#;
        help.trim().to_string()
    }
}
