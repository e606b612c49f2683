//! Place-name to administrative-code resolution.
//!
//! Free text like 東京都, "tokyo" or "13" resolves against the cached
//! prefecture and municipality tables through a ladder of strategies,
//! tried in order: code passthrough, exact Japanese name, suffix-
//! insensitive name, romaji alias, substring. Ambiguous substring
//! matches are reported as candidates instead of being guessed.

use serde::Serialize;

use crate::types::{Municipality, Prefecture};

/// Romaji aliases for the 47 prefectures.
const PREF_ROMAJI: &[(&str, &str)] = &[
    ("hokkaido", "北海道"),
    ("aomori", "青森県"),
    ("iwate", "岩手県"),
    ("miyagi", "宮城県"),
    ("akita", "秋田県"),
    ("yamagata", "山形県"),
    ("fukushima", "福島県"),
    ("ibaraki", "茨城県"),
    ("tochigi", "栃木県"),
    ("gunma", "群馬県"),
    ("saitama", "埼玉県"),
    ("chiba", "千葉県"),
    ("tokyo", "東京都"),
    ("kanagawa", "神奈川県"),
    ("niigata", "新潟県"),
    ("toyama", "富山県"),
    ("ishikawa", "石川県"),
    ("fukui", "福井県"),
    ("yamanashi", "山梨県"),
    ("nagano", "長野県"),
    ("gifu", "岐阜県"),
    ("shizuoka", "静岡県"),
    ("aichi", "愛知県"),
    ("mie", "三重県"),
    ("shiga", "滋賀県"),
    ("kyoto", "京都府"),
    ("osaka", "大阪府"),
    ("hyogo", "兵庫県"),
    ("nara", "奈良県"),
    ("wakayama", "和歌山県"),
    ("tottori", "鳥取県"),
    ("shimane", "島根県"),
    ("okayama", "岡山県"),
    ("hiroshima", "広島県"),
    ("yamaguchi", "山口県"),
    ("tokushima", "徳島県"),
    ("kagawa", "香川県"),
    ("ehime", "愛媛県"),
    ("kochi", "高知県"),
    ("fukuoka", "福岡県"),
    ("saga", "佐賀県"),
    ("nagasaki", "長崎県"),
    ("oita", "大分県"),
    ("miyazaki", "宮崎県"),
    ("kagoshima", "鹿児島県"),
    ("okinawa", "沖縄県"),
];

/// Fold full-width ASCII (１３, ＡＢ) and the ideographic space to their
/// half-width forms. Covers the NFKC cases that actually occur in
/// place-name and code input.
pub(crate) fn fold_width(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch {
            '\u{ff01}'..='\u{ff5e}' => {
                char::from_u32(ch as u32 - 0xfee0).unwrap_or(ch)
            }
            '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

fn canon(input: &str) -> String {
    fold_width(input.trim()).to_lowercase()
}

fn strip_pref_suffix(name: &str) -> &str {
    name.trim_end_matches(['都', '道', '府', '県'])
}

fn is_digits(input: &str) -> bool {
    !input.is_empty() && input.bytes().all(|byte| byte.is_ascii_digit())
}

/// A municipality the input could refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MunicipalityCandidate {
    /// Municipality code.
    pub municipality_code: String,
    /// Municipality name.
    pub municipality_name: String,
}

/// Input to code normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizeRequest {
    /// Prefecture name or code, free text.
    pub prefecture: Option<String>,
    /// Municipality name or five-digit code, free text.
    pub municipality: Option<String>,
}

/// Result of code normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NormalizedCodes {
    /// Resolved prefecture code.
    pub prefecture_code: Option<String>,
    /// Resolved prefecture name.
    pub prefecture_name: Option<String>,
    /// Resolved municipality code.
    pub municipality_code: Option<String>,
    /// Resolved municipality name.
    pub municipality_name: Option<String>,
    /// Ambiguous municipality candidates, when resolution stopped at a
    /// multi-way substring match.
    pub candidates: Vec<MunicipalityCandidate>,
    /// Which strategy produced the final match.
    pub matched_strategy: Option<&'static str>,
    /// Advisory notes about the resolution.
    pub warnings: Vec<String>,
}

pub(crate) struct PrefectureMatch {
    pub code: String,
    pub name: String,
    pub strategy: &'static str,
}

/// Resolve a prefecture against the code table.
pub(crate) fn match_prefecture(input: &str, rows: &[Prefecture]) -> Option<PrefectureMatch> {
    let canon_input = canon(input);

    if is_digits(&canon_input) {
        for row in rows {
            if row.code == canon_input
                || row.code.trim_start_matches('0') == canon_input.trim_start_matches('0')
            {
                return Some(PrefectureMatch {
                    code: row.code.clone(),
                    name: row.name.clone(),
                    strategy: "pref:code",
                });
            }
        }
    }

    let folded = fold_width(input.trim());
    let input_core = strip_pref_suffix(&folded);
    for row in rows {
        if row.name == folded || strip_pref_suffix(&row.name) == input_core {
            return Some(PrefectureMatch {
                code: row.code.clone(),
                name: row.name.clone(),
                strategy: "pref:jp_exact",
            });
        }
    }

    if canon_input.is_ascii() {
        let key: String = canon_input
            .chars()
            .filter(|ch| *ch != ' ' && *ch != '-')
            .collect();
        if let Some((_, alias)) = PREF_ROMAJI.iter().find(|(romaji, _)| *romaji == key) {
            if let Some(row) = rows.iter().find(|row| row.name == *alias) {
                return Some(PrefectureMatch {
                    code: row.code.clone(),
                    name: row.name.clone(),
                    strategy: "pref:romaji",
                });
            }
        }
    }

    for row in rows {
        let core = strip_pref_suffix(&row.name);
        if !core.is_empty() && folded.contains(core) {
            return Some(PrefectureMatch {
                code: row.code.clone(),
                name: row.name.clone(),
                strategy: "pref:jp_contains",
            });
        }
    }

    None
}

pub(crate) enum MunicipalityMatch {
    Resolved {
        code: String,
        name: String,
        strategy: &'static str,
    },
    Ambiguous(Vec<MunicipalityCandidate>),
    NotFound,
}

/// Resolve a municipality within one prefecture's table.
pub(crate) fn match_municipality(input: &str, rows: &[Municipality]) -> MunicipalityMatch {
    let canon_input = canon(input);

    if is_digits(&canon_input) && canon_input.len() >= 5 {
        for row in rows {
            if row.code == canon_input {
                return MunicipalityMatch::Resolved {
                    code: row.code.clone(),
                    name: row.name.clone(),
                    strategy: "muni:code_in_pref",
                };
            }
        }
        return MunicipalityMatch::NotFound;
    }

    let folded = fold_width(input.trim());
    for row in rows {
        if row.name == folded {
            return MunicipalityMatch::Resolved {
                code: row.code.clone(),
                name: row.name.clone(),
                strategy: "muni:jp_exact",
            };
        }
    }

    let mut candidates: Vec<MunicipalityCandidate> = rows
        .iter()
        .filter(|row| row.name.contains(&folded))
        .map(|row| MunicipalityCandidate {
            municipality_code: row.code.clone(),
            municipality_name: row.name.clone(),
        })
        .collect();
    match candidates.len() {
        0 => MunicipalityMatch::NotFound,
        1 => {
            let only = candidates.remove(0);
            MunicipalityMatch::Resolved {
                code: only.municipality_code,
                name: only.municipality_name,
                strategy: "muni:jp_contains_unique",
            }
        }
        _ => MunicipalityMatch::Ambiguous(candidates),
    }
}

/// Whether the input looks like a municipality code rather than a name.
pub(crate) fn looks_like_municipality_code(input: &str) -> bool {
    let canon_input = canon(input);
    is_digits(&canon_input) && canon_input.len() >= 5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefectures() -> Vec<Prefecture> {
        vec![
            Prefecture {
                code: "1".into(),
                name: "北海道".into(),
            },
            Prefecture {
                code: "13".into(),
                name: "東京都".into(),
            },
            Prefecture {
                code: "26".into(),
                name: "京都府".into(),
            },
        ]
    }

    fn municipalities() -> Vec<Municipality> {
        vec![
            Municipality {
                code: "13101".into(),
                prefecture_code: "13".into(),
                name: "千代田区".into(),
            },
            Municipality {
                code: "13104".into(),
                prefecture_code: "13".into(),
                name: "新宿区".into(),
            },
            Municipality {
                code: "13201".into(),
                prefecture_code: "13".into(),
                name: "八王子市".into(),
            },
        ]
    }

    #[test]
    fn folds_full_width_characters() {
        assert_eq!(fold_width("１３"), "13");
        assert_eq!(fold_width("ＡＢＣ"), "ABC");
        assert_eq!(fold_width("東京　都"), "東京 都");
    }

    #[test]
    fn prefecture_code_passthrough() {
        let rows = prefectures();
        let matched = match_prefecture("13", &rows).unwrap();
        assert_eq!(matched.code, "13");
        assert_eq!(matched.strategy, "pref:code");

        // Full-width digits fold before matching.
        let matched = match_prefecture("１３", &rows).unwrap();
        assert_eq!(matched.code, "13");

        // Leading zeros are ignored.
        let matched = match_prefecture("013", &rows).unwrap();
        assert_eq!(matched.code, "13");
    }

    #[test]
    fn prefecture_exact_and_suffix_insensitive() {
        let rows = prefectures();
        let matched = match_prefecture("東京都", &rows).unwrap();
        assert_eq!(matched.code, "13");
        assert_eq!(matched.strategy, "pref:jp_exact");

        let matched = match_prefecture("東京", &rows).unwrap();
        assert_eq!(matched.code, "13");
        assert_eq!(matched.strategy, "pref:jp_exact");
    }

    #[test]
    fn prefecture_romaji_alias() {
        let rows = prefectures();
        let matched = match_prefecture("Tokyo", &rows).unwrap();
        assert_eq!(matched.code, "13");
        assert_eq!(matched.strategy, "pref:romaji");

        let matched = match_prefecture("kyoto", &rows).unwrap();
        assert_eq!(matched.code, "26");
    }

    #[test]
    fn prefecture_contains_fallback() {
        let rows = prefectures();
        let matched = match_prefecture("東京都千代田区", &rows).unwrap();
        assert_eq!(matched.code, "13");
    }

    #[test]
    fn unknown_prefecture_is_none() {
        assert!(match_prefecture("atlantis", &prefectures()).is_none());
    }

    #[test]
    fn municipality_exact_match() {
        let rows = municipalities();
        let MunicipalityMatch::Resolved { code, strategy, .. } =
            match_municipality("千代田区", &rows)
        else {
            panic!("expected resolution");
        };
        assert_eq!(code, "13101");
        assert_eq!(strategy, "muni:jp_exact");
    }

    #[test]
    fn municipality_code_match() {
        let rows = municipalities();
        let MunicipalityMatch::Resolved { code, strategy, .. } =
            match_municipality("13104", &rows)
        else {
            panic!("expected resolution");
        };
        assert_eq!(code, "13104");
        assert_eq!(strategy, "muni:code_in_pref");
    }

    #[test]
    fn municipality_unique_substring_resolves() {
        let rows = municipalities();
        let MunicipalityMatch::Resolved { code, strategy, .. } =
            match_municipality("八王子", &rows)
        else {
            panic!("expected resolution");
        };
        assert_eq!(code, "13201");
        assert_eq!(strategy, "muni:jp_contains_unique");
    }

    #[test]
    fn municipality_ambiguous_substring_reports_candidates() {
        let rows = municipalities();
        let MunicipalityMatch::Ambiguous(candidates) = match_municipality("区", &rows) else {
            panic!("expected ambiguity");
        };
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn code_heuristic() {
        assert!(looks_like_municipality_code("13101"));
        assert!(looks_like_municipality_code("１３１０１"));
        assert!(!looks_like_municipality_code("131"));
        assert!(!looks_like_municipality_code("新宿区"));
    }
}
