//! Word-level caption generation (ASS subtitles).
//!
//! Captions are shown a page of words at a time in the lower part of the
//! frame. While a word is spoken the whole page is drawn with that word
//! highlighted in yellow and slightly enlarged; the rest stay dim white.

use std::fmt::Write as _;

use reel_models::{FrameSize, WordTiming};

/// Words shown together on one caption page.
pub const WORDS_PER_PAGE: usize = 7;

/// Distance of the caption baseline from the bottom edge, at 1920 px height.
const MARGIN_V: u32 = 250;

/// Font size at 1920 px height.
const FONT_SIZE: u32 = 54;

const ACTIVE_TAG: &str = "{\\c&H15CCFA&\\fscx110\\fscy110}";
const INACTIVE_TAG: &str = "{\\c&H59FFFFFF&\\fscx100\\fscy100}";

/// Clip word timings to a scene of `duration` seconds.
///
/// Words starting at or after the end are dropped; the rest end no later
/// than the scene.
pub fn clip_to_scene(words: &[WordTiming], duration: f64) -> Vec<WordTiming> {
    words
        .iter()
        .filter(|w| w.start < duration)
        .map(|w| WordTiming::new(w.word.clone(), w.start, w.end.min(duration)))
        .filter(|w| w.end > w.start)
        .collect()
}

/// Spread narration words evenly over the scene when no timings are given.
pub fn fallback_timings(narration: &str, duration: f64) -> Vec<WordTiming> {
    let words: Vec<&str> = narration.split_whitespace().collect();
    if words.is_empty() || duration <= 0.0 {
        return Vec::new();
    }

    let step = duration / words.len() as f64;
    words
        .iter()
        .enumerate()
        .map(|(idx, word)| WordTiming::new(*word, idx as f64 * step, (idx + 1) as f64 * step))
        .collect()
}

/// Format seconds as an ASS timestamp (`H:MM:SS.cc`).
pub fn format_ass_time(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).floor() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let secs = total_secs % 60;
    let minutes = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, cs)
}

/// Build a complete ASS document for one scene.
///
/// Returns `None` when there is nothing to show.
pub fn build_ass(words: &[WordTiming], frame: FrameSize) -> Option<String> {
    if words.is_empty() {
        return None;
    }

    let mut doc = header(frame);

    for page in words.chunks(WORDS_PER_PAGE) {
        for (active_idx, timing) in page.iter().enumerate() {
            let text = page
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let tag = if i == active_idx { ACTIVE_TAG } else { INACTIVE_TAG };
                    format!("{}{}", tag, sanitize(&w.word))
                })
                .collect::<Vec<_>>()
                .join(" ");

            let _ = writeln!(
                doc,
                "Dialogue: 0,{},{},Active,,0,0,0,,{}",
                format_ass_time(timing.start),
                format_ass_time(timing.end),
                text
            );
        }
    }

    Some(doc)
}

fn header(frame: FrameSize) -> String {
    let scale = frame.height as f64 / 1920.0;
    let font_size = ((FONT_SIZE as f64) * scale).round().max(1.0) as u32;
    let margin_v = ((MARGIN_V as f64) * scale).round() as u32;

    format!(
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         WrapStyle: 0\n\
         PlayResX: {w}\n\
         PlayResY: {h}\n\
         ScaledBorderAndShadow: yes\n\
         \n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
         Style: Active,Inter,{fs},&H15CCFA,&HFFFFFFFF,&H80000000,&H80000000,-1,0,0,0,110,110,0,0,1,0,4,2,10,10,{mv},1\n\
         \n\
         [Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        w = frame.width,
        h = frame.height,
        fs = font_size,
        mv = margin_v
    )
}

/// Strip characters that would be read as ASS override blocks or line breaks.
fn sanitize(word: &str) -> String {
    word.chars()
        .filter(|c| !matches!(c, '{' | '}' | '\\' | '\n' | '\r'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> Vec<WordTiming> {
        (0..n)
            .map(|i| WordTiming::new(format!("w{}", i), i as f64 * 0.5, i as f64 * 0.5 + 0.4))
            .collect()
    }

    #[test]
    fn test_format_ass_time() {
        assert_eq!(format_ass_time(0.0), "0:00:00.00");
        assert_eq!(format_ass_time(1.234), "0:00:01.23");
        assert_eq!(format_ass_time(61.5), "0:01:01.50");
        assert_eq!(format_ass_time(3725.5), "1:02:05.50");
    }

    #[test]
    fn test_clip_to_scene() {
        let input = vec![
            WordTiming::new("a", 0.0, 1.0),
            WordTiming::new("b", 1.5, 3.5),
            WordTiming::new("c", 3.0, 3.2),
            WordTiming::new("d", 4.0, 4.5),
        ];
        let clipped = clip_to_scene(&input, 3.0);
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped[1].word, "b");
        assert_eq!(clipped[1].end, 3.0);
    }

    #[test]
    fn test_fallback_timings() {
        let timings = fallback_timings("one two  three four", 2.0);
        assert_eq!(timings.len(), 4);
        assert_eq!(timings[0].start, 0.0);
        assert!((timings[3].end - 2.0).abs() < 1e-9);
        assert!(fallback_timings("   ", 2.0).is_empty());
    }

    #[test]
    fn test_build_ass_pages() {
        let doc = build_ass(&words(9), FrameSize::PORTRAIT_1080).unwrap();
        assert!(doc.contains("PlayResX: 1080"));
        assert!(doc.contains("PlayResY: 1920"));

        let dialogues: Vec<&str> = doc.lines().filter(|l| l.starts_with("Dialogue:")).collect();
        assert_eq!(dialogues.len(), 9);

        // First page has seven words, second page two
        assert_eq!(dialogues[0].matches("\\fscx").count(), 7);
        assert_eq!(dialogues[8].matches("\\fscx").count(), 2);
        assert!(dialogues[0].contains("{\\c&H15CCFA&\\fscx110\\fscy110}w0"));
        assert!(dialogues[1].contains("{\\c&H59FFFFFF&\\fscx100\\fscy100}w0"));
    }

    #[test]
    fn test_build_ass_empty() {
        assert!(build_ass(&[], FrameSize::PORTRAIT_1080).is_none());
    }

    #[test]
    fn test_sanitize_override_blocks() {
        let input = vec![WordTiming::new("{\\b1}hi", 0.0, 1.0)];
        let doc = build_ass(&input, FrameSize::PORTRAIT_1080).unwrap();
        assert!(doc.contains("b1hi"));
    }
}
