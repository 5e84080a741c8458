//! Conversion between Unicode emoji and Slack reaction short codes.

use emojis::{Emoji, SkinTone};

/// Slack writes single skin tones as `::skin-tone-2` through `::skin-tone-6`.
const SKIN_TONES: [(u8, SkinTone); 5] = [
    (2, SkinTone::Light),
    (3, SkinTone::MediumLight),
    (4, SkinTone::Medium),
    (5, SkinTone::MediumDark),
    (6, SkinTone::Dark),
];

fn tone_index(tone: SkinTone) -> Option<u8> {
    SKIN_TONES.iter().find(|(_, t)| *t == tone).map(|(n, _)| *n)
}

fn tone_from_suffix(suffix: &str) -> Option<SkinTone> {
    let n: u8 = suffix.strip_prefix("skin-tone-")?.parse().ok()?;
    SKIN_TONES.iter().find(|(i, _)| *i == n).map(|(_, t)| *t)
}

fn base_short_code(e: &Emoji) -> String {
    e.shortcode()
        .map(str::to_string)
        .unwrap_or_else(|| e.name().replace(' ', "_"))
}

/// Slack reaction name for an emoji: `"😀"` becomes `"grinning"` and
/// `"👍🏽"` becomes `"+1::skin-tone-4"`.
///
/// Input that is not a known glyph is treated as a short code and only has
/// its surrounding colons stripped, leaving Slack to reject unknown names.
/// Mixed-tone glyphs fall back to the untoned short code.
pub fn to_short_code(emoji: &str) -> String {
    let Some(e) = emojis::get(emoji) else {
        return emoji.trim_matches(':').to_string();
    };
    let base = e.with_skin_tone(SkinTone::Default).unwrap_or(e);
    match e.skin_tone().and_then(tone_index) {
        Some(n) => format!("{}::skin-tone-{}", base_short_code(base), n),
        None => base_short_code(base),
    }
}

/// Unicode glyph for a Slack short code, or the bare short code when none is known.
///
/// A `::skin-tone-N` suffix selects the toned glyph; an unknown tone keeps the
/// untoned one.
pub fn to_glyph(short_code: &str) -> String {
    let name = short_code.trim_matches(':');
    let (base, suffix) = match name.split_once("::") {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (name, None),
    };

    let Some(e) = emojis::get_by_shortcode(base) else {
        return name.to_string();
    };
    suffix
        .and_then(tone_from_suffix)
        .and_then(|tone| e.with_skin_tone(tone))
        .unwrap_or(e)
        .as_str()
        .to_string()
}
