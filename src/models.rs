use serde::Deserialize;

/// Typed view of a character document as consumed by the image pipeline.
///
/// Unknown fields are ignored; everything except `appearance` is optional
/// because the text pipeline passes provider output through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CharacterDescription {
    #[serde(default)]
    pub name: Option<String>,
    /// Male/Female/Other, advisory only.
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub hobbies: Vec<String>,
    #[serde(default)]
    pub appearance: Option<Appearance>,
}

/// Appearance descriptors. Each list is positional: index 0 is the primary
/// descriptor and index 1 the secondary one (e.g. `hair = [length, color]`).
/// Prompt templating reads them by position, so order must be preserved.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Appearance {
    #[serde(default)]
    pub hair: Vec<String>,
    #[serde(default)]
    pub facial: Vec<String>,
    #[serde(default)]
    pub eyes: Vec<String>,
    #[serde(default)]
    pub height: Vec<String>,
    #[serde(default)]
    pub weight: Vec<String>,
    #[serde(default)]
    pub skin: Vec<String>,
}

impl Appearance {
    /// Names of the required lists that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("hair", &self.hair),
            ("skin", &self.skin),
            ("eyes", &self.eyes),
            ("height", &self.height),
            ("weight", &self.weight),
            ("facial", &self.facial),
        ]
        .into_iter()
        .filter(|(_, values)| values.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_deserialize_as_empty() {
        let parsed: CharacterDescription =
            serde_json::from_str(r#"{"appearance":{"hair":[]}}"#).unwrap();
        let appearance = parsed.appearance.unwrap();
        assert_eq!(
            appearance.missing_fields(),
            vec!["hair", "skin", "eyes", "height", "weight", "facial"]
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let parsed: CharacterDescription = serde_json::from_str(
            r#"{"name":"Ava","age":31,"traits":["bold"],"appearance":{"hair":["short","brown"],"tattoos":["none"]}}"#,
        )
        .unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Ava"));
        assert_eq!(parsed.appearance.unwrap().hair, vec!["short", "brown"]);
    }
}
