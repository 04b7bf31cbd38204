use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CHARSET: &str = "UTF-8";
pub const DEFAULT_SEVERITY: &str = "warning";
pub const DEFAULT_FILE_EXTENSIONS: &str = "java, properties, xml";
pub const DEFAULT_LINE_LENGTH: u32 = 120;
pub const DEFAULT_LINE_LENGTH_IGNORE_PATTERN: &str =
    "^package.*|^import.*|a href|href|http://|https://|ftp://";

/// The structured form of a rule configuration: the scalar engine
/// parameters plus one switch per supported rule module.
///
/// Deserialization fills absent fields from the documented defaults, so a
/// full replace with a sparse body behaves like "complete with defaults".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleSet {
    pub charset: String,
    pub severity: String,
    pub file_extensions: String,
    pub line_length: u32,
    pub line_length_ignore_pattern: String,

    pub outer_type_filename: bool,
    pub illegal_token_text: bool,
    pub avoid_escaped_unicode_characters: bool,
    pub avoid_star_import: bool,
    pub one_top_level_class: bool,
    pub no_line_wrap: bool,
    pub empty_block: bool,
    pub need_braces: bool,
    pub left_curly: bool,
    pub right_curly: bool,
    pub empty_statement: bool,
    pub equals_hash_code: bool,
    pub illegal_instantiation: bool,
    pub missing_switch_default: bool,
    pub simplify_boolean_expression: bool,
    pub simplify_boolean_return: bool,
    pub final_class: bool,
    pub hide_utility_class_constructor: bool,
    pub interface_is_type: bool,
    pub visibility_modifier: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            charset: DEFAULT_CHARSET.to_string(),
            severity: DEFAULT_SEVERITY.to_string(),
            file_extensions: DEFAULT_FILE_EXTENSIONS.to_string(),
            line_length: DEFAULT_LINE_LENGTH,
            line_length_ignore_pattern: DEFAULT_LINE_LENGTH_IGNORE_PATTERN
                .to_string(),
            outer_type_filename: true,
            illegal_token_text: true,
            avoid_escaped_unicode_characters: true,
            avoid_star_import: true,
            one_top_level_class: true,
            no_line_wrap: true,
            empty_block: true,
            need_braces: true,
            left_curly: true,
            right_curly: true,
            empty_statement: true,
            equals_hash_code: true,
            illegal_instantiation: true,
            missing_switch_default: true,
            simplify_boolean_expression: true,
            simplify_boolean_return: true,
            final_class: true,
            hide_utility_class_constructor: true,
            interface_is_type: true,
            visibility_modifier: true,
        }
    }
}

/// Partial update form: every field optional, absent fields leave the
/// current value untouched when applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleSetPatch {
    pub charset: Option<String>,
    pub severity: Option<String>,
    pub file_extensions: Option<String>,
    pub line_length: Option<u32>,
    pub line_length_ignore_pattern: Option<String>,

    pub outer_type_filename: Option<bool>,
    pub illegal_token_text: Option<bool>,
    pub avoid_escaped_unicode_characters: Option<bool>,
    pub avoid_star_import: Option<bool>,
    pub one_top_level_class: Option<bool>,
    pub no_line_wrap: Option<bool>,
    pub empty_block: Option<bool>,
    pub need_braces: Option<bool>,
    pub left_curly: Option<bool>,
    pub right_curly: Option<bool>,
    pub empty_statement: Option<bool>,
    pub equals_hash_code: Option<bool>,
    pub illegal_instantiation: Option<bool>,
    pub missing_switch_default: Option<bool>,
    pub simplify_boolean_expression: Option<bool>,
    pub simplify_boolean_return: Option<bool>,
    pub final_class: Option<bool>,
    pub hide_utility_class_constructor: Option<bool>,
    pub interface_is_type: Option<bool>,
    pub visibility_modifier: Option<bool>,
}

macro_rules! apply_fields {
    ($patch:expr, $target:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if let Some(value) = $patch.$field.clone() {
                $target.$field = value;
            }
        )+
    };
}

impl RuleSetPatch {
    /// Merge this patch over `target`, field by field.
    pub fn apply_to(&self, target: &mut RuleSet) {
        apply_fields!(
            self,
            target,
            [
                charset,
                severity,
                file_extensions,
                line_length,
                line_length_ignore_pattern,
                outer_type_filename,
                illegal_token_text,
                avoid_escaped_unicode_characters,
                avoid_star_import,
                one_top_level_class,
                no_line_wrap,
                empty_block,
                need_braces,
                left_curly,
                right_curly,
                empty_statement,
                equals_hash_code,
                illegal_instantiation,
                missing_switch_default,
                simplify_boolean_expression,
                simplify_boolean_return,
                final_class,
                hide_utility_class_constructor,
                interface_is_type,
                visibility_modifier,
            ]
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == RuleSetPatch::default()
    }
}

/// The active rule configuration together with its stored metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRules {
    #[serde(flatten)]
    pub rules: RuleSet,
    pub id: Uuid,
    pub config_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
