//! Output formatting for ranked search results

use crate::query::SearchResults;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print ranked hits, one block per document
pub fn print_results(results: &SearchResults, color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    if results.hits.is_empty() {
        writeln!(stdout, "No matches.")?;
        return Ok(());
    }

    for (rank, hit) in results.hits.iter().enumerate() {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(stdout, "{:>3}. ", rank + 1)?;
        stdout.reset()?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true))?;
        write!(stdout, "{}/{}", hit.repository, hit.path)?;
        stdout.reset()?;
        writeln!(stdout, "  (score {:.3})", hit.score)?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        write!(stdout, "     commit {}", short_commit(&hit.commit_id))?;
        stdout.reset()?;
        writeln!(stdout, "  {}  {}", hit.commit_author, hit.commit_date)?;
    }

    writeln!(stdout)?;
    if results.total_matches as usize > results.hits.len() {
        writeln!(
            stdout,
            "Showing {} of {} matches.",
            results.hits.len(),
            results.total_matches
        )?;
    } else {
        writeln!(stdout, "{} matches.", results.total_matches)?;
    }

    Ok(())
}

fn short_commit(commit_id: &str) -> &str {
    if commit_id.len() > 12 {
        &commit_id[..12]
    } else {
        commit_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_commit() {
        assert_eq!(short_commit("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_commit("c1"), "c1");
    }
}
