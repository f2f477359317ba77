//! MEDLINE plain-text record extraction.
//!
//! PubMed's `format=pubmed` export is one tagged field per line:
//!
//! ```text
//! PMID- 37000001
//! LR  - 20230115
//! TI  - Longevity Study
//! LID - 10.1/xyz [doi]
//! ```
//!
//! Records are located by a scanner that walks through three states:
//!
//! 1. seeking the record start (`PMID`, then `LR`);
//! 2. in the record fields (8-digit date, `TI` title line, `LID ... [doi]`);
//! 3. seeking keywords (`OT`/`MH` lines) inside the span the record covered.
//!
//! A record span begins where the previous one ended and stops right after
//! its `[doi]` tag, so keyword lines printed after the DOI line are picked up
//! by the following record. Any upstream change to tag spelling or field
//! order makes the scan silently return fewer records; nothing here reports
//! that as an error.

use crate::error::Result;
use crate::pubmed::PubmedClient;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use tracing::{debug, info};

/// Tag closing the DOI identifier on an `LID` line
const DOI_TAG: &str = "[doi]";

/// Number of digits in a record date token (YYYYMMDD)
const DATE_LEN: usize = 8;

/// One paper extracted from a MEDLINE page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub doi: String,
    pub title: String,
    /// 8-digit date token, e.g. `20230115`
    pub date: String,
    /// `OT`/`MH` terms in order of appearance
    pub keywords: Vec<String>,
}

/// A raw match of the record scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMatch<'a> {
    /// Full text covered by the match, from the previous match end to `[doi]`
    pub span: &'a str,
    pub date: &'a str,
    /// Title, trimmed
    pub title: &'a str,
    /// DOI, trimmed
    pub doi: &'a str,
}

impl RecordMatch<'_> {
    /// Convert into an owned record, collecting keywords from the span
    pub fn to_record(&self) -> PaperRecord {
        PaperRecord {
            doi: self.doi.to_string(),
            title: self.title.to_string(),
            date: self.date.to_string(),
            keywords: extract_keywords(self.span),
        }
    }
}

/// Byte ranges of the fields after the date token
struct FieldSpans {
    title: Range<usize>,
    doi: Range<usize>,
    /// Offset right after `[doi]`
    end: usize,
}

/// Iterator over non-overlapping record matches, left to right.
pub struct RecordScanner<'a> {
    text: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> RecordScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            done: false,
        }
    }

    /// Date token position after the record start markers
    fn seek_record_start(&self, from: usize) -> Option<usize> {
        let pmid = find_from(self.text, from, "PMID")?;
        let lr = find_from(self.text, pmid + "PMID".len(), "LR")?;
        find_date(self.text, lr + "LR".len())
    }

    /// Title and DOI fields following the date token
    fn scan_fields(&self, date_end: usize) -> Option<FieldSpans> {
        // An earlier TI always ends no later than any following one, so when
        // the first TI cannot reach a DOI no later TI can either.
        let (_, ends) = find_tag(self.text, date_end, &["TI"])?;

        // Longest separator first; shorter ones only differ when the
        // separator crosses a line break.
        for &title_start in ends.iter().rev() {
            let Some(title_end) = line_end(self.text, title_start) else {
                continue;
            };
            if let Some((doi_start, doi_end)) = find_doi(self.text, title_end + 1) {
                return Some(FieldSpans {
                    title: title_start..title_end,
                    doi: doi_start..doi_end,
                    end: doi_end + DOI_TAG.len(),
                });
            }
        }
        None
    }
}

impl<'a> Iterator for RecordScanner<'a> {
    type Item = RecordMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = self.pos;
        let found = self.seek_record_start(start).and_then(|date_start| {
            let date_end = date_start + DATE_LEN;
            self.scan_fields(date_end)
                .map(|fields| (date_start, date_end, fields))
        });

        let Some((date_start, date_end, fields)) = found else {
            self.done = true;
            return None;
        };

        self.pos = fields.end;
        Some(RecordMatch {
            span: &self.text[start..fields.end],
            date: &self.text[date_start..date_end],
            title: self.text[fields.title].trim(),
            doi: self.text[fields.doi].trim(),
        })
    }
}

/// Collect every `OT`/`MH` keyword in `span`, in order of appearance.
pub fn extract_keywords(span: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    let mut pos = 0;

    while let Some((_, ends)) = find_tag(span, pos, &["OT", "MH"]) {
        let line = ends
            .iter()
            .rev()
            .find_map(|&start| line_end(span, start).map(|end| (start, end)));

        // Without a line feed after this tag there is none after later tags either.
        let Some((start, end)) = line else {
            break;
        };

        keywords.push(span[start..end].trim().to_string());
        pos = end + 1;
    }

    keywords
}

/// Extract novel records from a MEDLINE page.
///
/// A record whose DOI is in `known` is skipped entirely, as is a repeat of a
/// DOI already extracted from the same page.
pub fn extract_records(text: &str, known: &HashSet<String>) -> Vec<PaperRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for found in RecordScanner::new(text) {
        if known.contains(found.doi) || !seen.insert(found.doi) {
            debug!(doi = found.doi, "Skipping known paper");
            skipped += 1;
            continue;
        }
        records.push(found.to_record());
    }

    debug!(new = records.len(), skipped = skipped, "Scanned MEDLINE page");
    records
}

/// Fetch one page of longevity records, newest first, and return the novel ones.
///
/// # Errors
///
/// Network and HTTP failures propagate unchanged.
pub async fn fetch_records(
    client: &PubmedClient,
    page_size: u32,
    known: &HashSet<String>,
) -> Result<Vec<PaperRecord>> {
    let url = client.longevity_search_url(page_size)?;
    info!(size = page_size, known = known.len(), "Starting longevity search");

    let text = client.fetch(&url).await?;
    let records = extract_records(&text, known);

    info!(new = records.len(), "Longevity search complete");
    Ok(records)
}

fn find_from(text: &str, from: usize, needle: &str) -> Option<usize> {
    text.get(from..)?.find(needle).map(|i| from + i)
}

/// Position of the next line feed at or after `from`
fn line_end(text: &str, from: usize) -> Option<usize> {
    find_from(text, from, "\n")
}

/// Start of the first run of `DATE_LEN` ASCII digits at or after `from`
fn find_date(text: &str, from: usize) -> Option<usize> {
    let mut run = 0;
    for (i, b) in text.as_bytes().iter().enumerate().skip(from) {
        if b.is_ascii_digit() {
            run += 1;
            if run == DATE_LEN {
                return Some(i + 1 - DATE_LEN);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// End offsets of each prefix of the whitespace/hyphen run starting at `from`.
///
/// The last element is the greedy end; empty when there is no separator.
fn separator_ends(text: &str, from: usize) -> Vec<usize> {
    text.get(from..)
        .map(|rest| {
            rest.char_indices()
                .take_while(|(_, c)| c.is_whitespace() || *c == '-')
                .map(|(i, c)| from + i + c.len_utf8())
                .collect()
        })
        .unwrap_or_default()
}

/// First occurrence of any of `tags` at or after `from` that is followed by a
/// separator. Returns the tag position and the separator end offsets.
fn find_tag(text: &str, from: usize, tags: &[&str]) -> Option<(usize, Vec<usize>)> {
    let mut search = from;
    loop {
        let (at, tag) = tags
            .iter()
            .filter_map(|tag| find_from(text, search, tag).map(|at| (at, *tag)))
            .min_by_key(|(at, _)| *at)?;

        let ends = separator_ends(text, at + tag.len());
        if !ends.is_empty() {
            return Some((at, ends));
        }
        search = at + 1;
    }
}

/// DOI range of the first `LID` line at or after `from` that carries `[doi]`.
///
/// The DOI runs from the separator to the last `[doi]` on that line.
fn find_doi(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut search = from;
    loop {
        let (at, ends) = find_tag(text, search, &["LID"])?;

        for &start in ends.iter().rev() {
            let stop = line_end(text, start).unwrap_or(text.len());
            if let Some(rel) = text[start..stop].rfind(DOI_TAG) {
                return Some((start, start + rel));
            }
        }
        search = at + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    const ONE_RECORD: &str = "PMID- 37000001\n\
OWN - NLM\n\
STAT- Publisher\n\
LR  - 20230115\n\
IS  - 1474-9726 (Electronic)\n\
DP  - 2023 Jan\n\
TI  - Longevity Study\n\
OT  - aging\n\
MH  - senescence\n\
LID - 10.1/xyz [doi]\n\
AB  - Lifespan was extended in all cohorts.\n";

    const PAGE: &str = "\n\
PMID- 38100002\n\
OWN - NLM\n\
STAT- Publisher\n\
LR  - 20240102\n\
IS  - 1474-9726 (Electronic)\n\
DP  - 2024 Jan 2\n\
TI  - Caloric restriction and healthy aging in primates.\n\
PG  - e14012\n\
LID - S0047-6374(23)00112-3 [pii]\n\
LID - 10.1016/j.mad.2023.111900 [doi]\n\
AB  - Caloric restriction extends lifespan. NOT all effects persist.\n\
FAU - Doe, Jane\n\
AU  - Doe J\n\
MH  - Aging/physiology\n\
MH  - Caloric Restriction\n\
OTO - NOTNLM\n\
OT  - longevity\n\
\n\
PMID- 38100001\n\
OWN - NLM\n\
STAT- MEDLINE\n\
DCOM- 20231230\n\
LR  - 20231231\n\
DP  - 2023 Dec\n\
TI  - Centenarian genomes reveal protective variants.\n\
LID - 10.1038/s41586-023-0001 [doi]\n\
AB  - Whole genome sequencing of centenarians.\n\
OT  - centenarians\n\
\n\
PMID- 38100000\n\
LR  - 20231220\n\
TI  - Preprint without a DOI.\n\
LID - S1234 [pii]\n";

    fn known(dois: &[&str]) -> HashSet<String> {
        dois.iter().map(|s| s.to_string()).collect()
    }

    fn oracle_record() -> Regex {
        Regex::new(r"(?s).*?PMID.*?LR.*?([0-9]{8}).*?TI[\s-]+(.*?)\n.*?LID[\s-]+([^\n]*)\[doi\]")
            .expect("valid regex")
    }

    fn oracle_keyword() -> Regex {
        Regex::new(r"(?s).*?(OT|MH)[\s-]+(.*?)\n").expect("valid regex")
    }

    fn assert_matches_oracle(text: &str) {
        let record_re = oracle_record();
        let keyword_re = oracle_keyword();

        let expected: Vec<(String, String, String, String, Vec<String>)> = record_re
            .captures_iter(text)
            .map(|caps| {
                let span = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                let group = |i: usize| caps.get(i).map(|m| m.as_str().trim()).unwrap_or_default();
                let keywords: Vec<String> = keyword_re
                    .captures_iter(span)
                    .map(|k| k.get(2).map(|m| m.as_str().trim()).unwrap_or_default().to_string())
                    .collect();
                (
                    span.to_string(),
                    group(1).to_string(),
                    group(2).to_string(),
                    group(3).to_string(),
                    keywords,
                )
            })
            .collect();

        let actual: Vec<(String, String, String, String, Vec<String>)> = RecordScanner::new(text)
            .map(|m| {
                (
                    m.span.to_string(),
                    m.date.to_string(),
                    m.title.to_string(),
                    m.doi.to_string(),
                    extract_keywords(m.span),
                )
            })
            .collect();

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_single_record_fields() {
        let records = extract_records(ONE_RECORD, &HashSet::new());
        assert_eq!(
            records,
            vec![PaperRecord {
                doi: "10.1/xyz".to_string(),
                title: "Longevity Study".to_string(),
                date: "20230115".to_string(),
                keywords: vec!["aging".to_string(), "senescence".to_string()],
            }]
        );
    }

    #[test]
    fn test_known_doi_is_skipped() {
        let text = ONE_RECORD.replace("10.1/xyz", "10.1/abc");
        let records = extract_records(&text, &known(&["10.1/abc"]));
        assert!(records.is_empty());
    }

    #[test]
    fn test_page_in_source_order() {
        let records = extract_records(PAGE, &HashSet::new());
        let dois: Vec<&str> = records.iter().map(|r| r.doi.as_str()).collect();
        assert_eq!(
            dois,
            vec!["10.1016/j.mad.2023.111900", "10.1038/s41586-023-0001"]
        );
        assert_eq!(records[0].date, "20240102");
        assert_eq!(records[0].title, "Caloric restriction and healthy aging in primates.");
        assert_eq!(records[1].date, "20231231");
        assert_eq!(records[1].title, "Centenarian genomes reveal protective variants.");
    }

    #[test]
    fn test_keywords_after_doi_belong_to_next_span() {
        let records = extract_records(PAGE, &HashSet::new());
        assert!(records[0].keywords.is_empty());
        // "NOT all" in the abstract reads as an OT field as well
        assert_eq!(
            records[1].keywords,
            vec![
                "all effects persist.",
                "Aging/physiology",
                "Caloric Restriction",
                "longevity",
            ]
        );
    }

    #[test]
    fn test_pii_only_record_is_not_matched() {
        let matches: Vec<_> = RecordScanner::new(PAGE).collect();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| !m.span.contains("Preprint")));
    }

    #[test]
    fn test_skipping_known_keeps_later_records() {
        let records = extract_records(PAGE, &known(&["10.1016/j.mad.2023.111900"]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doi, "10.1038/s41586-023-0001");
    }

    #[test]
    fn test_duplicate_doi_within_page() {
        let text = format!("{}\n{}", ONE_RECORD, ONE_RECORD);
        assert_eq!(RecordScanner::new(&text).count(), 2);
        assert_eq!(extract_records(&text, &HashSet::new()).len(), 1);
    }

    #[test]
    fn test_unrecognized_text_yields_nothing() {
        assert!(extract_records("", &HashSet::new()).is_empty());
        assert!(extract_records("<html>Rate limited</html>", &HashSet::new()).is_empty());
        assert!(extract_keywords("no tags here\n").is_empty());
    }

    #[test]
    fn test_title_separator_crossing_line_break() {
        // Empty TI value: the separator swallows the line feed and the next line is the title
        let text = "PMID- 1\nLR  - 20200101\nTI  - \n  Wrapped title\nLID - 10.5/wrap [doi]\n";
        let found: Vec<_> = RecordScanner::new(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Wrapped title");
        assert_eq!(found[0].doi, "10.5/wrap");
    }

    #[test]
    fn test_date_takes_first_eight_digits() {
        let text = "PMID- 1\nLR  - 202301159\nTI  - T\nLID - 10.5/d [doi]\n";
        let found: Vec<_> = RecordScanner::new(text).collect();
        assert_eq!(found[0].date, "20230115");
    }

    #[test]
    fn test_last_doi_tag_on_line() {
        let text = "PMID- 1\nLR  - 20230101\nTI  - T\nLID - 10.5/a [doi] alias [doi]\n";
        let found: Vec<_> = RecordScanner::new(text).collect();
        assert_eq!(found[0].doi, "10.5/a [doi] alias");
    }

    #[test]
    fn test_keyword_without_trailing_line_feed() {
        assert!(extract_keywords("OT  - dangling").is_empty());
        assert_eq!(extract_keywords("MH  - \n"), vec![String::new()]);
    }

    #[test]
    fn test_scanner_agrees_with_pattern() {
        assert_matches_oracle(ONE_RECORD);
        assert_matches_oracle(PAGE);
        assert_matches_oracle("PMID- 1\nLR  - 20200101\nTI  - \n  Wrapped title\nLID - 10.5/wrap [doi]\n");
        assert_matches_oracle("PMID- 1\nLR  - 20200101\nTI-\n");
        assert_matches_oracle("PMID- 1\nLR  - 2020\nTI  - x\nLID - 10.5/x [doi]\n");
        assert_matches_oracle("PMID- 1\nLR  - 20200101\nTITLE\nTI  - real\nLID - 10.5/x [pii]\nLID -\n10.5/y [doi]\n");
        assert_matches_oracle("MH  - a\nPMID- 1\nLR  - 20200101\nMH  - b\nTI  - é title\nLID - 10.5/ü [doi]MH - c\n");
    }
}
