use crate::lyrics::types::{LyricLine, LyricsDocument, LyricsError};
use once_cell::sync::Lazy;
use regex::Regex;

static BRACKET_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\[\]]*)\]").unwrap());

static METADATA_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+:").unwrap());

/// Minutes followed by a colon; anything else in brackets is lyric text.
static TIME_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+:").unwrap());

/// Parse tagged lyrics text into a sorted document.
///
/// Every `[mm:ss.xx]` tag starts an entry whose text runs to the next time
/// tag on the same line, so `[00:01.00]Hello[00:05.00]World` yields two
/// entries. Tags with nothing between them share the text that follows
/// (`[00:01.00][00:30.00]Chorus`). Metadata tags such as `[ar:...]` and
/// lines without any time tag are skipped.
pub fn parse(text: &str) -> Result<LyricsDocument, LyricsError> {
    let mut lines = Vec::new();
    for line in text.lines() {
        parse_line(line, &mut lines)?;
    }
    if lines.is_empty() {
        return Err(LyricsError::NoTimedLines);
    }

    lines.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(LyricsDocument::new(merge_same_time(lines), text))
}

fn parse_line(line: &str, out: &mut Vec<LyricLine>) -> Result<(), LyricsError> {
    // (time, tag start, tag end) for every time tag on the line
    let mut tags = Vec::new();
    for cap in BRACKET_TAG_RE.captures_iter(line) {
        let (Some(whole), Some(inner)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let content = inner.as_str().trim();
        if METADATA_TAG_RE.is_match(content) {
            continue;
        }
        if !TIME_TAG_RE.is_match(content) {
            // Plain bracketed text like "[Chorus]" or "[1]" stays in the lyric.
            continue;
        }
        let time = parse_timestamp(content).ok_or_else(|| LyricsError::MalformedTag {
            tag: content.to_string(),
        })?;
        tags.push((time, whole.start(), whole.end()));
    }

    let mut pending = Vec::new();
    for (i, &(time, _, end)) in tags.iter().enumerate() {
        let next_start = tags.get(i + 1).map(|t| t.1).unwrap_or(line.len());
        let segment = line[end..next_start].trim();
        pending.push(time);
        let is_last = i + 1 == tags.len();
        if segment.is_empty() && !is_last {
            continue;
        }
        for time in pending.drain(..) {
            out.push(LyricLine {
                time,
                text: segment.to_string(),
            });
        }
    }
    Ok(())
}

/// Parse `m:ss`, `m:ss.f` (one to three fraction digits) or `m:ss:ff` into
/// seconds.
fn parse_timestamp(tag: &str) -> Option<f64> {
    let (min, rest) = tag.split_once(':')?;
    let (sec, frac) = match rest.split_once(['.', ':']) {
        Some((sec, frac)) => (sec, Some(frac)),
        None => (rest, None),
    };
    let min: u32 = parse_digits(min)?;
    let sec: u32 = parse_digits(sec)?;
    let mut time = min as f64 * 60.0 + sec as f64;
    if let Some(frac) = frac {
        if frac.is_empty() || frac.len() > 3 {
            return None;
        }
        let value: u32 = parse_digits(frac)?;
        time += value as f64 / 10f64.powi(frac.len() as i32);
    }
    Some(time)
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Fold entries sharing a timestamp into one, concatenating their text in
/// source order. Input must already be sorted.
fn merge_same_time(lines: Vec<LyricLine>) -> Vec<LyricLine> {
    let mut merged: Vec<LyricLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.last_mut() {
            Some(last) if last.time == line.time => last.text.push_str(&line.text),
            _ => merged.push(line),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(doc: &LyricsDocument) -> Vec<f64> {
        doc.lines.iter().map(|l| l.time).collect()
    }

    fn texts(doc: &LyricsDocument) -> Vec<&str> {
        doc.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn parses_inline_tags_into_separate_entries() {
        let doc = parse("[00:01.00]Hello[00:05.00]World").unwrap();
        assert_eq!(times(&doc), vec![1.0, 5.0]);
        assert_eq!(texts(&doc), vec!["Hello", "World"]);
        assert_eq!(doc.raw, "[00:01.00]Hello[00:05.00]World");
    }

    #[test]
    fn parses_netease_style_document() {
        let lrc = "[by:someone]\n\
                   {\"t\":0,\"c\":[{\"tx\":\"作词: \"}]}\n\
                   [00:00.000] 作曲 : 某人\n\
                   [00:12.34]First line\n\
                   [01:02.5]Second line\n";
        let doc = parse(lrc).unwrap();
        assert_eq!(texts(&doc), vec!["作曲 : 某人", "First line", "Second line"]);
        assert!((doc.lines[1].time - 12.34).abs() < 1e-9);
        assert!((doc.lines[2].time - 62.5).abs() < 1e-9);
    }

    #[test]
    fn sorted_input_keeps_declared_order() {
        let doc = parse("[00:01.00]a\n[00:02.00]b\n[00:03.50]c\n[10:00.00]d").unwrap();
        assert_eq!(texts(&doc), vec!["a", "b", "c", "d"]);
        assert_eq!(times(&doc), vec![1.0, 2.0, 3.5, 600.0]);
    }

    #[test]
    fn repeated_tags_share_following_text_and_get_sorted() {
        let doc = parse("[00:30.00][00:10.00]Chorus\n[00:20.00]Verse").unwrap();
        assert_eq!(times(&doc), vec![10.0, 20.0, 30.0]);
        assert_eq!(texts(&doc), vec!["Chorus", "Verse", "Chorus"]);
    }

    #[test]
    fn duplicate_timestamps_are_concatenated() {
        let doc = parse("[00:04.00]foo\n[00:04.00]bar\n[00:06.00]baz").unwrap();
        assert_eq!(times(&doc), vec![4.0, 6.0]);
        assert_eq!(texts(&doc), vec!["foobar", "baz"]);
    }

    #[test]
    fn trailing_tag_keeps_empty_terminator() {
        let doc = parse("[00:00.00]搜索歌词中[23:59.59]").unwrap();
        assert_eq!(texts(&doc), vec!["搜索歌词中", ""]);
        assert!((doc.lines[1].time - 1439.59).abs() < 1e-9);
    }

    #[test]
    fn bracketed_words_stay_in_text() {
        let doc = parse("[00:03.00][Chorus] la la").unwrap();
        assert_eq!(texts(&doc), vec!["[Chorus] la la"]);
    }

    #[test]
    fn footnote_numbers_stay_in_text() {
        let doc = parse("[00:03.00]see note [1] here\n[00:06.00][2024] live").unwrap();
        assert_eq!(texts(&doc), vec!["see note [1] here", "[2024] live"]);
        assert_eq!(times(&doc), vec![3.0, 6.0]);
    }

    #[test]
    fn malformed_tag_is_an_error() {
        match parse("[00:01.00]ok\n[00:0x.00]bad") {
            Err(LyricsError::MalformedTag { tag }) => assert_eq!(tag, "00:0x.00"),
            other => panic!("expected MalformedTag, got {:?}", other),
        }
        assert!(matches!(
            parse("[00:01.12345]too precise"),
            Err(LyricsError::MalformedTag { .. })
        ));
        assert!(matches!(
            parse("[99999999999:00.00]overflow"),
            Err(LyricsError::MalformedTag { .. })
        ));
    }

    #[test]
    fn text_without_time_tags_is_rejected() {
        assert!(matches!(parse(""), Err(LyricsError::NoTimedLines)));
        assert!(matches!(
            parse("[ti:Title]\nplain words"),
            Err(LyricsError::NoTimedLines)
        ));
    }

    #[test]
    fn timestamp_variants() {
        let close = |tag: &str, expected: f64| {
            let got = parse_timestamp(tag).unwrap();
            assert!((got - expected).abs() < 1e-9, "{tag}: {got} != {expected}");
        };
        close("00:12", 12.0);
        close("01:30", 90.0);
        close("00:12.3", 12.3);
        close("00:12.34", 12.34);
        close("00:12.340", 12.34);
        close("00:12:34", 12.34);
        assert_eq!(parse_timestamp("00:"), None);
        assert_eq!(parse_timestamp("12"), None);
        assert_eq!(parse_timestamp("00:12."), None);
    }
}
