//! Marker decoder and encoder.

use std::borrow::Cow;

use serde::{
    Deserialize,
    Serialize,
};

use crate::types::MarkerRecord;

/// Opens a marker.
const OPEN: &str = "_(";

/// How substitution placeholders are protected inside `SOURCE`.
///
/// The upstream grammar embeds sources verbatim. Some producers double the
/// placeholder character instead, so that `%%s` in the marker stands for the literal
/// `%s` of the source term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceEscaping {
    /// Sources are embedded as-is.
    #[default]
    None,
    /// The given character is doubled on encode and collapsed on decode.
    Doubled(char),
}

impl SourceEscaping {
    /// Protects `source` for embedding.
    fn escape(self, source: &str) -> Cow<'_, str> {
        match self {
            Self::Doubled(c) if source.contains(c) => {
                Cow::Owned(source.replace(c, &String::from_iter([c, c])))
            }
            _ => Cow::Borrowed(source),
        }
    }

    /// Reverses [`Self::escape`].
    fn unescape(self, source: String) -> String {
        match self {
            Self::Doubled(c) => {
                let mut out = String::with_capacity(source.len());
                let mut chars = source.chars().peekable();
                while let Some(ch) = chars.next() {
                    out.push(ch);
                    if ch == c && chars.peek() == Some(&c) {
                        chars.next();
                    }
                }
                out
            }
            Self::None => source,
        }
    }
}

/// Result of decoding a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The string holds no complete marker and is unchanged.
    PlainText(String),
    /// Markers were found.
    Translated {
        /// Displayed text, every marker replaced by its translation.
        text: String,
        /// Decoded markers, innermost first.
        markers: Vec<MarkerRecord>,
    },
}

impl Decoded {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::PlainText(text) | Self::Translated { text, .. } => text,
        }
    }

    #[must_use]
    pub fn markers(&self) -> &[MarkerRecord] {
        match self {
            Self::PlainText(_) => &[],
            Self::Translated { markers, .. } => markers,
        }
    }

    #[must_use]
    pub const fn has_markers(&self) -> bool {
        matches!(self, Self::Translated { .. })
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<MarkerRecord>) {
        match self {
            Self::PlainText(text) => (text, Vec::new()),
            Self::Translated { text, markers } => (text, markers),
        }
    }
}

/// Grammar segment a frame is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    /// Up to `,`.
    Context,
    /// Exactly one `0` or `1`.
    Flag,
    /// Expects `{`.
    FlagEnd,
    /// Up to `}[`.
    Source,
    /// Up to `])`, may nest.
    Translation,
}

/// An open marker.
#[derive(Debug)]
struct Frame {
    /// Byte offset of the opening `_(`.
    start: usize,
    /// Length of the marker list when the frame opened.
    markers_before: usize,
    /// Current segment.
    segment: Segment,
    /// Context read so far.
    context: String,
    /// Flag.
    translated: bool,
    /// Raw source read so far.
    source: String,
    /// Decoded translation read so far.
    translation: String,
}

impl Frame {
    /// Frame opened at byte `start`, in its context segment.
    const fn new(start: usize, markers_before: usize) -> Self {
        Self {
            start,
            markers_before,
            segment: Segment::Context,
            context: String::new(),
            translated: false,
            source: String::new(),
            translation: String::new(),
        }
    }
}

/// What a frame did with a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// The character belongs to the frame.
    Consumed,
    /// The character also consumed the lookahead.
    ConsumedPair,
    /// The frame closes; the lookahead was consumed.
    Close,
    /// The frame is malformed at this character.
    Abort,
}

/// Full parse output.
#[derive(Debug, Default)]
struct Parse {
    /// Displayed text.
    output: String,
    /// Decoded markers.
    markers: Vec<MarkerRecord>,
    /// Byte spans of top-level markers.
    top_level: Vec<(usize, usize)>,
}

/// Decoder and encoder for the marker grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerCodec {
    /// Escaping rule for sources.
    escaping: SourceEscaping,
}

impl MarkerCodec {
    #[must_use]
    pub const fn new(escaping: SourceEscaping) -> Self {
        Self { escaping }
    }

    #[must_use]
    pub const fn escaping(&self) -> SourceEscaping {
        self.escaping
    }

    /// Decodes every marker of `text`.
    ///
    /// Never fails: an unterminated or malformed marker is kept as literal text.
    #[must_use]
    pub fn decode(&self, text: &str) -> Decoded {
        if !text.contains(OPEN) {
            return Decoded::PlainText(text.to_string());
        }
        let parse = self.parse(text);
        if parse.markers.is_empty() {
            Decoded::PlainText(text.to_string())
        } else {
            Decoded::Translated { text: parse.output, markers: parse.markers }
        }
    }

    /// Renders a marker.
    ///
    /// A `translation` that already is a single complete marker is returned unchanged,
    /// so repeated rendering never wraps a string twice.
    #[must_use]
    pub fn encode(&self, context: &str, translated: bool, source: &str, translation: &str) -> String {
        if self.is_marker(translation) {
            return translation.to_string();
        }
        format!(
            "_({context},{}{{{}}}[{translation}])",
            u8::from(translated),
            self.escaping.escape(source)
        )
    }

    /// Whether `text` is exactly one complete marker.
    #[must_use]
    pub fn is_marker(&self, text: &str) -> bool {
        text.starts_with(OPEN)
            && text.ends_with("])")
            && self.parse(text).top_level.first() == Some(&(0, text.len()))
    }

    /// Runs the frame stack over `text`.
    fn parse(&self, text: &str) -> Parse {
        let mut parse = Parse::default();
        let mut stack: Vec<Frame> = Vec::new();
        let mut chars = text.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            let next = chars.peek().map(|&(_, c)| c);
            loop {
                let opens = ch == '_'
                    && next == Some('(')
                    && stack.last().is_none_or(|frame| {
                        matches!(frame.segment, Segment::Translation | Segment::Context)
                    });
                if opens {
                    // A new opening inside a context means the outer `_(` was literal.
                    if stack.last().is_some_and(|frame| frame.segment == Segment::Context) {
                        abort(text, offset, &mut stack, &mut parse);
                    }
                    chars.next();
                    stack.push(Frame::new(offset, parse.markers.len()));
                    break;
                }

                let nested = stack.len() > 1;
                let Some(frame) = stack.last_mut() else {
                    parse.output.push(ch);
                    break;
                };
                match step(frame, ch, next, nested) {
                    Step::Consumed => {}
                    Step::ConsumedPair => {
                        chars.next();
                    }
                    Step::Close => {
                        chars.next();
                        self.close(offset + 2, &mut stack, &mut parse);
                    }
                    Step::Abort => {
                        abort(text, offset, &mut stack, &mut parse);
                        // Re-read the character in the enclosing frame.
                        continue;
                    }
                }
                break;
            }
        }

        // Unterminated: everything from the outermost open marker stays literal.
        if let Some(bottom) = stack.first() {
            parse.output.push_str(text.get(bottom.start..).unwrap_or_default());
            parse.markers.truncate(bottom.markers_before);
            parse.top_level.retain(|&(start, _)| start < bottom.start);
        }

        parse
    }

    /// Closes the top frame at byte offset `end`.
    fn close(&self, end: usize, stack: &mut Vec<Frame>, parse: &mut Parse) {
        let Some(frame) = stack.pop() else {
            return;
        };
        match stack.last_mut() {
            Some(parent) => parent.translation.push_str(&frame.translation),
            None => {
                parse.output.push_str(&frame.translation);
                parse.top_level.push((frame.start, end));
            }
        }
        parse.markers.push(MarkerRecord {
            context: frame.context,
            translated: frame.translated,
            source: self.escaping.unescape(frame.source),
            translation: frame.translation,
        });
    }
}

/// Feeds one character to `frame`.
///
/// A `nested` frame sits in the translation of its parent, which ends at the first
/// `])`. Meeting it before the frame reached its own translation aborts the frame.
fn step(frame: &mut Frame, ch: char, next: Option<char>, nested: bool) -> Step {
    let closes_parent = nested && ch == ']' && next == Some(')');
    match frame.segment {
        Segment::Context | Segment::Source if closes_parent => Step::Abort,
        Segment::Context => {
            if ch == ',' {
                frame.segment = Segment::Flag;
            } else {
                frame.context.push(ch);
            }
            Step::Consumed
        }
        Segment::Flag => match ch {
            '0' | '1' => {
                frame.translated = ch == '1';
                frame.segment = Segment::FlagEnd;
                Step::Consumed
            }
            _ => Step::Abort,
        },
        Segment::FlagEnd => {
            if ch == '{' {
                frame.segment = Segment::Source;
                Step::Consumed
            } else {
                Step::Abort
            }
        }
        Segment::Source => {
            if ch == '}' && next == Some('[') {
                frame.segment = Segment::Translation;
                Step::ConsumedPair
            } else {
                frame.source.push(ch);
                Step::Consumed
            }
        }
        Segment::Translation => {
            if ch == ']' && next == Some(')') {
                Step::Close
            } else {
                frame.translation.push(ch);
                Step::Consumed
            }
        }
    }
}

/// Drops the top frame, emitting its raw text `text[start..offset]` as literal.
fn abort(text: &str, offset: usize, stack: &mut Vec<Frame>, parse: &mut Parse) {
    let Some(frame) = stack.pop() else {
        return;
    };
    let raw = text.get(frame.start..offset).unwrap_or_default();
    match stack.last_mut() {
        Some(parent) => parent.translation.push_str(raw),
        None => parse.output.push_str(raw),
    }
    parse.markers.truncate(frame.markers_before);
}

/// Decodes `text` with the default escaping rule.
#[must_use]
pub fn decode(text: &str) -> Decoded {
    MarkerCodec::default().decode(text)
}

/// Encodes a marker with the default escaping rule.
#[must_use]
pub fn encode(context: &str, translated: bool, source: &str, translation: &str) -> String {
    MarkerCodec::default().encode(context, translated, source, translation)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn record(context: &str, translated: bool, source: &str, translation: &str) -> MarkerRecord {
        MarkerRecord::new(context, translated, source, translation)
    }

    #[googletest::test]
    fn plain_text_is_returned_unchanged() {
        expect_that!(decode("Nothing to see"), eq(&Decoded::PlainText("Nothing to see".into())));
        expect_that!(decode(""), eq(&Decoded::PlainText(String::new())));
    }

    #[googletest::test]
    fn decodes_single_marker() {
        let decoded = decode("_(web,1{Save}[Enregistrer])");

        expect_that!(decoded.text(), eq("Enregistrer"));
        expect_that!(decoded.markers().to_vec(), elements_are![eq(&record("web", true, "Save", "Enregistrer"))]);
    }

    #[googletest::test]
    fn keeps_surrounding_text() {
        let decoded = decode("Total: _(sale,0{Amount}[Amount]) (EUR)");

        expect_that!(decoded.text(), eq("Total: Amount (EUR)"));
        expect_that!(decoded.markers().len(), eq(1));
    }

    #[googletest::test]
    fn decodes_sibling_markers_in_order() {
        let decoded = decode("_(a,0{One}[Un]) and _(b,1{Two}[Deux])");

        expect_that!(decoded.text(), eq("Un and Deux"));
        expect_that!(
            decoded.markers().to_vec(),
            elements_are![eq(&record("a", false, "One", "Un")), eq(&record("b", true, "Two", "Deux"))]
        );
    }

    #[googletest::test]
    fn nested_markers_are_flattened_innermost_first() {
        let decoded = decode("_(a,1{s1}[_(b,0{s2}[t2]) wrapper])");

        expect_that!(decoded.text(), eq("t2 wrapper"));
        expect_that!(
            decoded.markers().to_vec(),
            elements_are![
                eq(&record("b", false, "s2", "t2")),
                eq(&record("a", true, "s1", "t2 wrapper"))
            ]
        );
    }

    #[googletest::test]
    fn deeply_nested_markers() {
        let decoded = decode("_(a,1{%s!}[_(b,1{%s?}[_(c,0{x}[y])?])!])");

        expect_that!(decoded.text(), eq("y?!"));
        expect_that!(
            decoded.markers().iter().map(|m| m.context.clone()).collect::<Vec<_>>(),
            elements_are![eq("c"), eq("b"), eq("a")]
        );
    }

    #[rstest]
    #[case::unterminated_translation("_(a,1{s}[unterminated")]
    #[case::unterminated_source("_(a,1{never closed")]
    #[case::unterminated_context("see _(docs")]
    #[case::bad_flag("_(a,2{s}[t])")]
    #[case::missing_brace("_(a,1s}[t])")]
    #[case::lone_opener("_(")]
    fn malformed_input_is_kept_verbatim(#[case] input: &str) {
        let decoded = decode(input);

        assert_that!(decoded, eq(&Decoded::PlainText(input.to_string())));
        assert_that!(decoded.markers().len(), eq(0));
    }

    #[googletest::test]
    fn unterminated_outer_marker_drops_inner_records() {
        let input = "_(a,1{s}[_(b,0{x}[y]) still open";

        expect_that!(decode(input), eq(&Decoded::PlainText(input.to_string())));
    }

    #[googletest::test]
    fn malformed_prefix_does_not_hide_following_marker() {
        let decoded = decode("_(a,x _(b,0{Save}[Save])");

        expect_that!(decoded.text(), eq("_(a,x Save"));
        expect_that!(decoded.markers().to_vec(), elements_are![eq(&record("b", false, "Save", "Save"))]);
    }

    #[googletest::test]
    fn literal_opener_in_text_before_marker() {
        let decoded = decode("call _(x) then _(web,0{Go}[Go])");

        expect_that!(decoded.text(), eq("call _(x) then Go"));
        expect_that!(decoded.markers().to_vec(), elements_are![eq(&record("web", false, "Go", "Go"))]);
    }

    #[googletest::test]
    fn malformed_nested_marker_stays_inside_translation() {
        let decoded = decode("_(a,0{s}[x _(b,? y])");

        expect_that!(decoded.text(), eq("x _(b,? y"));
        expect_that!(decoded.markers().to_vec(), elements_are![eq(&record("a", false, "s", "x _(b,? y"))]);
    }

    #[rstest]
    #[case::literal_opener("_(a,0{s}[call _(x) now])", "call _(x) now")]
    #[case::opener_before_close("_(a,0{s}[wait _(])", "wait _(")]
    #[case::unterminated_inner_source("_(a,0{s}[x _(b,0{y])", "x _(b,0{y")]
    #[case::unterminated_inner_flag("_(a,0{s}[x _(b,])", "x _(b,")]
    fn unfinished_nested_opener_yields_to_parent_close(#[case] input: &str, #[case] text: &str) {
        let decoded = decode(input);

        assert_that!(decoded.text(), eq(text));
        assert_that!(decoded.markers().to_vec(), elements_are![eq(&record("a", false, "s", text))]);
    }

    #[googletest::test]
    fn literal_opener_inside_translation_keeps_following_markers() {
        let decoded = decode("_(a,1{s}[f _(x) g]) then _(b,0{Go}[Go])");

        expect_that!(decoded.text(), eq("f _(x) g then Go"));
        expect_that!(
            decoded.markers().to_vec(),
            elements_are![eq(&record("a", true, "s", "f _(x) g")), eq(&record("b", false, "Go", "Go"))]
        );
    }

    #[googletest::test]
    fn keeps_multibyte_text() {
        let decoded = decode("« _(web,1{Delete}[Supprimer l'élément]) » ✓");

        expect_that!(decoded.text(), eq("« Supprimer l'élément » ✓"));
    }

    #[rstest]
    #[case::simple("web", false, "Save", "Save")]
    #[case::translated("web", true, "Save", "Enregistrer")]
    #[case::empty_translation("base", true, "Empty", "")]
    #[case::placeholders("sale", true, "%s items", "%s articles")]
    #[case::unicode("web", true, "Close", "閉じる")]
    fn encode_then_decode_returns_the_record(
        #[case] context: &str,
        #[case] translated: bool,
        #[case] source: &str,
        #[case] translation: &str,
    ) {
        let decoded = decode(&encode(context, translated, source, translation));

        assert_that!(decoded.text(), eq(translation));
        assert_that!(
            decoded.markers().to_vec(),
            elements_are![eq(&record(context, translated, source, translation))]
        );
    }

    #[googletest::test]
    fn encode_renders_the_grammar() {
        expect_that!(encode("web", true, "Save", "Enregistrer"), eq("_(web,1{Save}[Enregistrer])"));
        expect_that!(encode("web", false, "Save", "Save"), eq("_(web,0{Save}[Save])"));
    }

    #[googletest::test]
    fn encode_does_not_wrap_twice() {
        let once = encode("web", true, "Save", "Enregistrer");

        expect_that!(encode("web", true, "Save", &once), eq(&once));
    }

    #[googletest::test]
    fn encode_wraps_partial_markers() {
        let inner = encode("b", false, "x", "y");
        let translation = format!("{inner} and more");

        let outer = encode("a", true, "s", &translation);

        expect_that!(outer, eq(&format!("_(a,1{{s}}[{translation}])")));
        expect_that!(decode(&outer).markers().len(), eq(2));
    }

    #[googletest::test]
    fn is_marker_requires_a_single_complete_marker() {
        let codec = MarkerCodec::default();

        expect_that!(codec.is_marker("_(a,0{s}[t])"), eq(true));
        expect_that!(codec.is_marker("_(a,0{s}[_(b,1{x}[y])])"), eq(true));
        expect_that!(codec.is_marker("_(a,0{s}[t]) _(b,0{x}[y])"), eq(false));
        expect_that!(codec.is_marker("_(a,0{s}[t"), eq(false));
        expect_that!(codec.is_marker("t"), eq(false));
    }

    #[googletest::test]
    fn doubled_escaping_collapses_placeholders() {
        let codec = MarkerCodec::new(SourceEscaping::Doubled('%'));

        let decoded = codec.decode("_(web,1{%%s records}[%s enregistrements])");

        expect_that!(decoded.markers()[0].source, eq("%s records"));
        expect_that!(decoded.markers()[0].translation, eq("%s enregistrements"));
    }

    #[googletest::test]
    fn doubled_escaping_round_trips() {
        let codec = MarkerCodec::new(SourceEscaping::Doubled('%'));

        let encoded = codec.encode("web", false, "100% of %s", "100% of 3");

        expect_that!(encoded, eq("_(web,0{100%% of %%s}[100% of 3])"));
        expect_that!(codec.decode(&encoded).markers()[0].source, eq("100% of %s"));
    }

    #[googletest::test]
    fn default_escaping_keeps_sources_verbatim() {
        let decoded = decode("_(web,1{%%s}[x])");

        expect_that!(decoded.markers()[0].source, eq("%%s"));
    }

    #[googletest::test]
    fn escaping_deserializes_from_settings_json() {
        let doubled: SourceEscaping = serde_json::from_str(r#"{"doubled": "%"}"#).unwrap();
        let none: SourceEscaping = serde_json::from_str(r#""none""#).unwrap();

        expect_that!(doubled, eq(SourceEscaping::Doubled('%')));
        expect_that!(none, eq(SourceEscaping::None));
    }

    #[googletest::test]
    fn into_parts_splits_text_and_markers() {
        let (text, markers) = decode("_(a,0{s}[t])!").into_parts();

        expect_that!(text, eq("t!"));
        expect_that!(markers, len(eq(1)));
    }
}
