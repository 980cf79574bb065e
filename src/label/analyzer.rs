use serde::Serialize;

use crate::error::ApiError;

/// Ingredient names classified as "bad". Membership is an exact
/// case-insensitive match; no stemming, no substring matching, so "msg" does
/// not hit "monosodium glutamate".
const DENY_LIST: [&str; 5] = [
    "sugar",
    "high fructose corn syrup",
    "monosodium glutamate",
    "trans fat",
    "artificial coloring",
];

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngredientStatus {
    Good,
    Bad,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct IngredientVerdict {
    pub name: String,
    pub status: IngredientStatus,
}

/// Splits a comma-separated ingredient string and classifies each entry.
/// Input order and duplicates are preserved. Pure function.
pub fn analyze(raw: &str) -> Result<Vec<IngredientVerdict>, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::validation("No ingredients provided"));
    }

    let verdicts = raw
        .split(',')
        .map(|term| {
            let name = term.trim().to_lowercase();
            let status = if DENY_LIST.contains(&name.as_str()) {
                IngredientStatus::Bad
            } else {
                IngredientStatus::Good
            };
            IngredientVerdict { name, status }
        })
        .collect();

    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_and_statuses(raw: &str) -> Vec<(String, IngredientStatus)> {
        analyze(raw)
            .unwrap()
            .into_iter()
            .map(|v| (v.name, v.status))
            .collect()
    }

    #[test]
    fn empty_input_is_a_validation_error() {
        assert!(matches!(analyze(""), Err(ApiError::Validation(_))));
        assert!(matches!(analyze("   "), Err(ApiError::Validation(_))));
    }

    #[test]
    fn exact_match_boundary_msg_is_good() {
        // "msg" is not a deny-list entry; only the spelled-out name is.
        let verdicts = names_and_statuses("Sugar, Salt, MSG");
        assert_eq!(
            verdicts,
            vec![
                ("sugar".into(), IngredientStatus::Bad),
                ("salt".into(), IngredientStatus::Good),
                ("msg".into(), IngredientStatus::Good),
            ]
        );
    }

    #[test]
    fn multi_word_deny_entries_match() {
        let verdicts = names_and_statuses("water, High Fructose Corn Syrup, trans fat");
        assert_eq!(verdicts[0].1, IngredientStatus::Good);
        assert_eq!(verdicts[1].1, IngredientStatus::Bad);
        assert_eq!(verdicts[2].1, IngredientStatus::Bad);
    }

    #[test]
    fn order_and_duplicates_preserved() {
        let verdicts = names_and_statuses("sugar, water, sugar");
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].0, "sugar");
        assert_eq!(verdicts[1].0, "water");
        assert_eq!(verdicts[2].0, "sugar");
        assert_eq!(verdicts[2].1, IngredientStatus::Bad);
    }

    #[test]
    fn whitespace_is_trimmed_and_case_folded() {
        let verdicts = names_and_statuses("  Monosodium Glutamate ,ARTIFICIAL COLORING");
        assert_eq!(verdicts[0].0, "monosodium glutamate");
        assert_eq!(verdicts[0].1, IngredientStatus::Bad);
        assert_eq!(verdicts[1].1, IngredientStatus::Bad);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(analyze("sugar").unwrap()).unwrap();
        assert_eq!(json[0]["status"], "bad");
        assert_eq!(json[0]["name"], "sugar");
    }
}
