use serde::{Deserialize, Serialize};

use crate::filter_escape;

/// libass numpad code for bottom-center placement.
pub const BOTTOM_CENTER: u8 = 2;

/// Look of the burned-in subtitles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    pub outline: u32,
    pub shadow: u32,
    /// Accepted for callers, not forwarded: the encoded style always uses
    /// [`BOTTOM_CENTER`].
    pub alignment: u8,
    pub margin_v: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "Inter".to_string(),
            font_size: 16,
            outline: 2,
            shadow: 1,
            alignment: BOTTOM_CENTER,
            margin_v: 80,
        }
    }
}

/// Renders the `force_style` value for the `subtitles` filter, escaped for
/// both filter-graph passes.
///
/// The fields are joined with `,`, which the graph pass sees as `\,`. libass
/// splits the value on every comma, so commas are dropped from the font name.
pub fn encode_style(style: &SubtitleStyle) -> String {
    let font_name = filter_escape::option(&style.font_name.replace(',', ""));
    let fields = [
        format!("FontName={font_name}"),
        format!("FontSize={}", style.font_size),
        format!("Outline={}", style.outline),
        format!("Shadow={}", style.shadow),
        format!("Alignment={BOTTOM_CENTER}"),
        format!("MarginV={}", style.margin_v),
    ];
    filter_escape::graph(&fields.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_escape::parse::filter_options;

    /// Field pairs as libass receives them, after ffmpeg has unescaped the
    /// argument string twice.
    fn decode(encoded: &str) -> Vec<(String, String)> {
        let options = filter_options(&format!("f.srt:force_style={encoded}"));
        assert_eq!(options.len(), 2, "style leaked into another option: {options:?}");
        let value = options[1].strip_prefix("force_style=").unwrap();
        value
            .split(',')
            .map(|field| {
                let (k, v) = field.split_once('=').unwrap();
                (k.to_string(), v.to_string())
            })
            .collect()
    }

    #[test]
    fn encodes_defaults_exactly() {
        assert_eq!(
            encode_style(&SubtitleStyle::default()),
            "FontName=Inter\\,FontSize=16\\,Outline=2\\,Shadow=1\\,Alignment=2\\,MarginV=80"
        );
    }

    #[test]
    fn keys_appear_in_fixed_order() {
        let style = SubtitleStyle {
            font_name: "DejaVu Sans".into(),
            font_size: 24,
            outline: 3,
            shadow: 0,
            alignment: 8,
            margin_v: 40,
        };
        let keys: Vec<String> = decode(&encode_style(&style))
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            ["FontName", "FontSize", "Outline", "Shadow", "Alignment", "MarginV"]
        );
    }

    #[test]
    fn values_round_trip_through_decoder() {
        let style = SubtitleStyle {
            font_name: "Noto Sans CJK".into(),
            font_size: 30,
            outline: 1,
            shadow: 2,
            alignment: BOTTOM_CENTER,
            margin_v: 120,
        };
        let fields = decode(&encode_style(&style));
        assert_eq!(fields[0].1, "Noto Sans CJK");
        assert_eq!(fields[1].1, "30");
        assert_eq!(fields[2].1, "1");
        assert_eq!(fields[3].1, "2");
        assert_eq!(fields[4].1, "2");
        assert_eq!(fields[5].1, "120");
    }

    #[test]
    fn alignment_field_is_not_forwarded() {
        let style = SubtitleStyle {
            alignment: 7,
            ..SubtitleStyle::default()
        };
        assert!(encode_style(&style).contains("Alignment=2"));
    }

    #[test]
    fn font_name_survives_option_and_graph_unescaping() {
        for name in ["Font: Bold", "It's Sans", r"Back\Slash", "Br[ack]et;s"] {
            let style = SubtitleStyle {
                font_name: name.into(),
                ..SubtitleStyle::default()
            };
            let fields = decode(&encode_style(&style));
            assert_eq!(fields[0], ("FontName".to_string(), name.to_string()));
            assert_eq!(fields.len(), 6, "font {name}");
        }
    }

    #[test]
    fn commas_are_dropped_from_font_name() {
        let style = SubtitleStyle {
            font_name: "Odd,Font".into(),
            ..SubtitleStyle::default()
        };
        let encoded = encode_style(&style);
        assert!(encoded.starts_with("FontName=OddFont\\,FontSize=16"));
        assert_eq!(decode(&encoded)[0].1, "OddFont");
    }
}
