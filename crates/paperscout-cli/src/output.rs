use std::io::Write;

use owo_colors::OwoColorize;
use paperscout_core::{ABSTRACT_NOT_FOUND, MatchResult, ProgressEvent, RunReport, VenueReport};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::VenuesResolved { .. } => {
            // The final report covers the empty case
        }
        ProgressEvent::VenueStarted { venue, .. } => {
            if color.enabled() {
                writeln!(w, "Found conference: {}", venue.acronym.bold().cyan())?;
                writeln!(w, "{}", venue.url.dimmed())?;
            } else {
                writeln!(w, "Found conference: {}", venue.acronym)?;
                writeln!(w, "{}", venue.url)?;
            }
            writeln!(w)?;
        }
        ProgressEvent::PublicationsFetched { count, batches, .. } => {
            writeln!(w, "Found {} papers ({} batches)", count, batches)?;
        }
        ProgressEvent::BatchMatched {
            batch_index,
            total_batches,
            batch_size,
            matched,
            ignored,
            ..
        } => {
            write!(
                w,
                "[{}/{}] {} titles -> {} matching",
                batch_index + 1,
                total_batches,
                batch_size,
                matched
            )?;
            if *ignored > 0 {
                let note = format!(" ({} unknown titles ignored)", ignored);
                if color.enabled() {
                    write!(w, "{}", note.yellow())?;
                } else {
                    write!(w, "{}", note)?;
                }
            }
            writeln!(w)?;
        }
        ProgressEvent::AbstractResolved { .. } => {
            // Not displayed in CLI output
        }
        ProgressEvent::VenueFinished { report } => {
            print_venue_matches(w, report, color)?;
        }
    }
    Ok(())
}

/// Print and flush a progress event. Write failures are logged, not fatal.
pub fn emit_progress(w: &mut dyn Write, event: &ProgressEvent, color: ColorMode) -> bool {
    match print_progress(w, event, color).and_then(|()| w.flush()) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "failed to write progress");
            false
        }
    }
}

/// Print the matching list after a venue has been processed.
pub fn print_venue_matches(
    w: &mut dyn Write,
    report: &VenueReport,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", format!("Matching papers ({}):", report.venue.acronym).bold())?;
    } else {
        writeln!(w, "Matching papers ({}):", report.venue.acronym)?;
    }
    if report.matches.is_empty() {
        writeln!(w, "  (none)")?;
    }
    for m in &report.matches {
        print_match_line(w, m, color)?;
    }
    writeln!(w)?;
    Ok(())
}

fn print_match_line(w: &mut dyn Write, m: &MatchResult, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "- {}", m.title.green())?;
    } else {
        writeln!(w, "- {}", m.title)?;
    }
    let link = m.link.as_deref().unwrap_or("(no link)");
    if color.enabled() {
        writeln!(w, "  {}", link.dimmed())?;
    } else {
        writeln!(w, "  {}", link)?;
    }
    match m.abstract_text.as_deref() {
        Some(ABSTRACT_NOT_FOUND) | None => {}
        Some(text) => {
            let text = truncate(text, 600);
            if color.enabled() {
                writeln!(w, "  {}", text.italic())?;
            } else {
                writeln!(w, "  {}", text)?;
            }
        }
    }
    Ok(())
}

/// Print the run summary.
pub fn print_summary(w: &mut dyn Write, report: &RunReport, color: ColorMode) -> std::io::Result<()> {
    if report.no_venues() {
        writeln!(w, "No venues found.")?;
        return Ok(());
    }

    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    let papers: usize = report.venues.iter().map(|v| v.publication_count).sum();
    let abstracts = report
        .matches
        .iter()
        .filter(|m| m.abstract_text.as_deref().is_some_and(|a| a != ABSTRACT_NOT_FOUND))
        .count();

    writeln!(w, "  Venues searched: {}", report.venues.len())?;
    writeln!(w, "  Papers scanned: {}", papers)?;
    if color.enabled() {
        writeln!(w, "  {} {}", "Matching:".green(), report.matches.len())?;
    } else {
        writeln!(w, "  Matching: {}", report.matches.len())?;
    }
    if abstracts > 0 {
        let msg = format!("Abstracts retrieved: {}/{}", abstracts, report.matches.len());
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperscout_core::VenueDescriptor;

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn report() -> RunReport {
        let matches = vec![
            MatchResult {
                title: "A fork() in the road.".into(),
                link: Some("https://doi.org/10.1145/3317550.3321435".into()),
                abstract_text: Some("Fork is a bad idea.".into()),
            },
            MatchResult {
                title: "Unikraft.".into(),
                link: None,
                abstract_text: Some(ABSTRACT_NOT_FOUND.into()),
            },
        ];
        RunReport {
            venues: vec![VenueReport {
                venue: VenueDescriptor {
                    acronym: "hotos".into(),
                    url: "https://dblp.org/db/conf/hotos/".into(),
                },
                publication_count: 120,
                batch_count: 3,
                matches: matches.clone(),
            }],
            matches,
        }
    }

    #[test]
    fn venue_started_prints_acronym_and_url() {
        let event = ProgressEvent::VenueStarted {
            index: 0,
            total: 1,
            venue: report().venues[0].venue.clone(),
        };
        let out = render(|w| print_progress(w, &event, ColorMode(false)));
        assert_eq!(out, "Found conference: hotos\nhttps://dblp.org/db/conf/hotos/\n\n");
    }

    #[test]
    fn batch_line_mentions_ignored_titles() {
        let event = ProgressEvent::BatchMatched {
            acronym: "hotos".into(),
            batch_index: 2,
            total_batches: 3,
            batch_size: 20,
            matched: 1,
            ignored: 2,
        };
        let out = render(|w| print_progress(w, &event, ColorMode(false)));
        assert_eq!(out, "[3/3] 20 titles -> 1 matching (2 unknown titles ignored)\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn emit_progress_reports_write_failure() {
        let event = ProgressEvent::PublicationsFetched {
            acronym: "hotos".into(),
            count: 3,
            batches: 1,
        };
        assert!(!emit_progress(&mut BrokenPipe, &event, ColorMode(false)));

        let mut buf = Vec::new();
        assert!(emit_progress(&mut buf, &event, ColorMode(false)));
        assert_eq!(String::from_utf8(buf).unwrap(), "Found 3 papers (1 batches)\n");
    }

    #[test]
    fn venue_matches_list_title_and_link() {
        let out = render(|w| print_venue_matches(w, &report().venues[0], ColorMode(false)));
        assert!(out.contains("Matching papers (hotos):"));
        assert!(out.contains("- A fork() in the road.\n  https://doi.org/10.1145/3317550.3321435\n"));
        assert!(out.contains("- Unikraft.\n  (no link)\n"));
    }

    #[test]
    fn abstracts_shown_unless_not_found() {
        let out = render(|w| print_venue_matches(w, &report().venues[0], ColorMode(false)));
        assert!(out.contains("  Fork is a bad idea.\n"));
        assert!(!out.contains(ABSTRACT_NOT_FOUND));
    }

    #[test]
    fn summary_counts() {
        let out = render(|w| print_summary(w, &report(), ColorMode(false)));
        assert!(out.contains("Papers scanned: 120"));
        assert!(out.contains("Matching: 2"));
        assert!(out.contains("Abstracts retrieved: 1/2"));
    }

    #[test]
    fn summary_without_venues() {
        let out = render(|w| print_summary(w, &RunReport::default(), ColorMode(false)));
        assert_eq!(out, "No venues found.\n");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("résumé", 2), "ré...");
        assert_eq!(truncate("short", 10), "short");
    }
}
