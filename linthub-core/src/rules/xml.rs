//! Bidirectional mapping between [`RuleSet`] and the Checkstyle XML
//! configuration document.
//!
//! Rendering is deterministic: fixed field order, fixed 4-space indent, so
//! an unchanged rule set always produces identical bytes. Parsing is
//! tolerant of unknown modules (ignored) but rejects malformed markup
//! outright instead of returning a partial result.

use linthub_model::rules::{
    DEFAULT_CHARSET, DEFAULT_FILE_EXTENSIONS, DEFAULT_LINE_LENGTH,
    DEFAULT_SEVERITY, RuleSet,
};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use crate::error::{AnalysisError, Result};

const DOCTYPE: &str = concat!(
    "<!DOCTYPE module PUBLIC ",
    "\"-//Puppy Crawl//DTD Check Configuration 1.3//EN\" ",
    "\"https://checkstyle.org/dtds/configuration_1_3.dtd\">"
);

/// Module names understood inside `TreeWalker`, in render order.
const TREE_WALKER_MODULES: [&str; 20] = [
    "OuterTypeFilename",
    "IllegalTokenText",
    "AvoidEscapedUnicodeCharacters",
    "AvoidStarImport",
    "OneTopLevelClass",
    "NoLineWrap",
    "EmptyBlock",
    "NeedBraces",
    "LeftCurly",
    "RightCurly",
    "EmptyStatement",
    "EqualsHashCode",
    "IllegalInstantiation",
    "MissingSwitchDefault",
    "SimplifyBooleanExpression",
    "SimplifyBooleanReturn",
    "FinalClass",
    "HideUtilityClassConstructor",
    "InterfaceIsType",
    "VisibilityModifier",
];

// Fixed sub-parameters; not user-configurable in this version.
const ILLEGAL_TOKEN_TEXT_TOKENS: &str = "STRING_LITERAL, CHAR_LITERAL";
const ILLEGAL_TOKEN_TEXT_FORMAT: &str = r"\\u00(08|09|0(a|A)|0(c|C)|0(d|D)|22|27|5(C|c))|\\(0(8|9|a|c|d)|1(0|1|2|3|4|5|6|7|8|9|a|b|c|d|e|f))";
const ILLEGAL_TOKEN_TEXT_MESSAGE: &str =
    "Avoid using corresponding octal or Unicode escape sequences.";

fn toggle(rules: &RuleSet, module: &str) -> bool {
    match module {
        "OuterTypeFilename" => rules.outer_type_filename,
        "IllegalTokenText" => rules.illegal_token_text,
        "AvoidEscapedUnicodeCharacters" => {
            rules.avoid_escaped_unicode_characters
        }
        "AvoidStarImport" => rules.avoid_star_import,
        "OneTopLevelClass" => rules.one_top_level_class,
        "NoLineWrap" => rules.no_line_wrap,
        "EmptyBlock" => rules.empty_block,
        "NeedBraces" => rules.need_braces,
        "LeftCurly" => rules.left_curly,
        "RightCurly" => rules.right_curly,
        "EmptyStatement" => rules.empty_statement,
        "EqualsHashCode" => rules.equals_hash_code,
        "IllegalInstantiation" => rules.illegal_instantiation,
        "MissingSwitchDefault" => rules.missing_switch_default,
        "SimplifyBooleanExpression" => rules.simplify_boolean_expression,
        "SimplifyBooleanReturn" => rules.simplify_boolean_return,
        "FinalClass" => rules.final_class,
        "HideUtilityClassConstructor" => {
            rules.hide_utility_class_constructor
        }
        "InterfaceIsType" => rules.interface_is_type,
        "VisibilityModifier" => rules.visibility_modifier,
        _ => false,
    }
}

fn set_toggle(rules: &mut RuleSet, module: &str, value: bool) {
    match module {
        "OuterTypeFilename" => rules.outer_type_filename = value,
        "IllegalTokenText" => rules.illegal_token_text = value,
        "AvoidEscapedUnicodeCharacters" => {
            rules.avoid_escaped_unicode_characters = value
        }
        "AvoidStarImport" => rules.avoid_star_import = value,
        "OneTopLevelClass" => rules.one_top_level_class = value,
        "NoLineWrap" => rules.no_line_wrap = value,
        "EmptyBlock" => rules.empty_block = value,
        "NeedBraces" => rules.need_braces = value,
        "LeftCurly" => rules.left_curly = value,
        "RightCurly" => rules.right_curly = value,
        "EmptyStatement" => rules.empty_statement = value,
        "EqualsHashCode" => rules.equals_hash_code = value,
        "IllegalInstantiation" => rules.illegal_instantiation = value,
        "MissingSwitchDefault" => rules.missing_switch_default = value,
        "SimplifyBooleanExpression" => {
            rules.simplify_boolean_expression = value
        }
        "SimplifyBooleanReturn" => rules.simplify_boolean_return = value,
        "FinalClass" => rules.final_class = value,
        "HideUtilityClassConstructor" => {
            rules.hide_utility_class_constructor = value
        }
        "InterfaceIsType" => rules.interface_is_type = value,
        "VisibilityModifier" => rules.visibility_modifier = value,
        _ => {}
    }
}

/// Serialize a rule set into the engine's configuration document.
pub fn render_config(rules: &RuleSet) -> String {
    let mut doc = String::with_capacity(2048);
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    doc.push_str(DOCTYPE);
    doc.push('\n');
    doc.push_str("<module name=\"Checker\">\n");

    push_property(&mut doc, 1, "charset", &rules.charset);
    push_property(&mut doc, 1, "severity", &rules.severity);
    push_property(&mut doc, 1, "fileExtensions", &rules.file_extensions);

    push_open(&mut doc, 1, "LineLength");
    push_property(&mut doc, 2, "max", &rules.line_length.to_string());
    if !rules.line_length_ignore_pattern.is_empty() {
        push_property(
            &mut doc,
            2,
            "ignorePattern",
            &rules.line_length_ignore_pattern,
        );
    }
    push_close(&mut doc, 1);

    push_open(&mut doc, 1, "TreeWalker");
    for module in TREE_WALKER_MODULES {
        if !toggle(rules, module) {
            continue;
        }
        match module {
            "IllegalTokenText" => {
                push_open(&mut doc, 2, module);
                push_property(
                    &mut doc,
                    3,
                    "tokens",
                    ILLEGAL_TOKEN_TEXT_TOKENS,
                );
                push_property(
                    &mut doc,
                    3,
                    "format",
                    ILLEGAL_TOKEN_TEXT_FORMAT,
                );
                push_property(
                    &mut doc,
                    3,
                    "message",
                    ILLEGAL_TOKEN_TEXT_MESSAGE,
                );
                push_close(&mut doc, 2);
            }
            "AvoidEscapedUnicodeCharacters" => {
                push_open(&mut doc, 2, module);
                push_property(
                    &mut doc,
                    3,
                    "allowEscapesForControlCharacters",
                    "true",
                );
                push_property(
                    &mut doc,
                    3,
                    "allowNonPrintableEscapes",
                    "true",
                );
                push_close(&mut doc, 2);
            }
            _ => push_empty_module(&mut doc, 2, module),
        }
    }
    push_close(&mut doc, 1);

    doc.push_str("</module>\n");
    doc
}

fn indent(doc: &mut String, depth: usize) {
    for _ in 0..depth {
        doc.push_str("    ");
    }
}

fn push_open(doc: &mut String, depth: usize, name: &str) {
    indent(doc, depth);
    doc.push_str(&format!("<module name=\"{name}\">\n"));
}

fn push_close(doc: &mut String, depth: usize) {
    indent(doc, depth);
    doc.push_str("</module>\n");
}

fn push_empty_module(doc: &mut String, depth: usize, name: &str) {
    indent(doc, depth);
    doc.push_str(&format!("<module name=\"{name}\"/>\n"));
}

fn push_property(doc: &mut String, depth: usize, name: &str, value: &str) {
    indent(doc, depth);
    doc.push_str(&format!(
        "<property name=\"{name}\" value=\"{}\"/>\n",
        escape(value)
    ));
}

/// Parse a configuration document back into a rule set.
///
/// Scalars fall back to the documented defaults when absent. A boolean is
/// true iff the matching module is a direct child of `TreeWalker`; unknown
/// modules are ignored. Malformed markup is an error, never a partial
/// result.
pub fn parse_config(xml: &str) -> Result<RuleSet> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = true;

    let mut rules = RuleSet {
        charset: DEFAULT_CHARSET.to_string(),
        severity: DEFAULT_SEVERITY.to_string(),
        file_extensions: DEFAULT_FILE_EXTENSIONS.to_string(),
        ..RuleSet::default()
    };
    for module in TREE_WALKER_MODULES {
        set_toggle(&mut rules, module, false);
    }

    // Stack of open elements: the module name attribute for `module`
    // elements, a tag marker for anything else.
    let mut stack: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut saw_line_length = false;

    loop {
        match reader.read_event().map_err(parse_error)? {
            Event::Start(start) => {
                saw_root = true;
                let frame = element_frame(&start)?;
                inspect_module(
                    &frame,
                    stack.last().map(String::as_str),
                    &mut rules,
                    &mut saw_line_length,
                );
                stack.push(frame);
            }
            Event::Empty(start) => {
                saw_root = true;
                let name = start.name();
                if name.as_ref() == b"property" {
                    let (key, value) = property_attrs(&start)?;
                    apply_property(
                        &mut rules,
                        stack.as_slice(),
                        &key,
                        &value,
                    )?;
                } else {
                    let frame = element_frame(&start)?;
                    inspect_module(
                        &frame,
                        stack.last().map(String::as_str),
                        &mut rules,
                        &mut saw_line_length,
                    );
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(AnalysisError::ConfigParse(
            "document has no root element".to_string(),
        ));
    }
    if !stack.is_empty() {
        return Err(AnalysisError::ConfigParse(format!(
            "unterminated element {:?}",
            stack.last().map(String::as_str).unwrap_or_default()
        )));
    }
    Ok(rules)
}

fn parse_error<E: std::fmt::Display>(err: E) -> AnalysisError {
    AnalysisError::ConfigParse(err.to_string())
}

/// Frame pushed for an opened element: the `name` attribute for `module`
/// elements, a non-matching marker otherwise.
fn element_frame(
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<String> {
    if start.name().as_ref() == b"module" {
        let name = start
            .try_get_attribute("name")
            .map_err(parse_error)?
            .map(|attr| {
                attr.unescape_value()
                    .map(|value| value.into_owned())
                    .map_err(parse_error)
            })
            .transpose()?;
        return Ok(name.unwrap_or_default());
    }
    Ok(format!(
        "<{}>",
        String::from_utf8_lossy(start.name().as_ref())
    ))
}

fn inspect_module(
    frame: &str,
    parent: Option<&str>,
    rules: &mut RuleSet,
    saw_line_length: &mut bool,
) {
    if frame == "LineLength" && !*saw_line_length {
        *saw_line_length = true;
        rules.line_length = DEFAULT_LINE_LENGTH;
        rules.line_length_ignore_pattern = String::new();
    }
    if parent == Some("TreeWalker") {
        set_toggle(rules, frame, true);
    }
}

fn property_attrs(
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<(String, String)> {
    let mut key = String::new();
    let mut value = String::new();
    for attr in start.attributes() {
        let attr = attr.map_err(parse_error)?;
        let unescaped =
            attr.unescape_value().map_err(parse_error)?.into_owned();
        match attr.key.as_ref() {
            b"name" => key = unescaped,
            b"value" => value = unescaped,
            _ => {}
        }
    }
    Ok((key, value))
}

fn apply_property(
    rules: &mut RuleSet,
    stack: &[String],
    key: &str,
    value: &str,
) -> Result<()> {
    match stack.last().map(String::as_str) {
        // Direct child of the document's root module.
        Some(_) if stack.len() == 1 => match key {
            "charset" => rules.charset = value.to_string(),
            "severity" => rules.severity = value.to_string(),
            "fileExtensions" => rules.file_extensions = value.to_string(),
            _ => {}
        },
        Some("LineLength") => match key {
            "max" => {
                rules.line_length = value.parse().map_err(|_| {
                    AnalysisError::ConfigParse(format!(
                        "LineLength max is not a number: {value:?}"
                    ))
                })?;
            }
            "ignorePattern" => {
                rules.line_length_ignore_pattern = value.to_string();
            }
            _ => {}
        },
        _ => {}
    }
    Ok(())
}
