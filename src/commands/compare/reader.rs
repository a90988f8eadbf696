use std::io::{BufRead, Lines};

use anyhow::{Context, Result};
use tracing::warn;

struct Source<R> {
    name: String,
    lines: Lines<R>,
}

// The group stream ends as soon as any source hits end of input or a blank line.
pub struct AlignedLines<R: BufRead> {
    sources: Vec<Source<R>>,
    line_number: usize,
    finished: bool,
}

impl<R: BufRead> AlignedLines<R> {
    pub fn new(sources: Vec<(String, R)>) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|(name, reader)| Source {
                    name,
                    lines: reader.lines(),
                })
                .collect(),
            line_number: 0,
            finished: false,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name.as_str()).collect()
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn next_group(&mut self) -> Result<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }

        let mut group = Vec::with_capacity(self.sources.len());
        let mut ended = Vec::new();

        for source in &mut self.sources {
            let next = source.lines.next().transpose().with_context(|| {
                format!(
                    "failed to read line {} of {}",
                    self.line_number + 1,
                    source.name
                )
            })?;

            match next.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => group.push(text.to_string()),
                _ => ended.push(source.name.clone()),
            }
        }

        if !ended.is_empty() {
            self.finished = true;
            if ended.len() < self.sources.len() {
                warn!(
                    line = self.line_number + 1,
                    ended = %ended.join(","),
                    "result file ended before the others, comparison stops here"
                );
            }
            return Ok(None);
        }

        self.line_number += 1;
        Ok(Some(group))
    }
}
