//! The tagging-rule interpreter: reads a small `<routino-tagging>` XML file
//! and applies its `<node>`/`<way>`/`<relation>` rule lists to every OSM tag
//! set before it reaches [`crate::osm`]'s tag-to-attribute translation.
//!
//! This is a minimal, directly-interpreted rule engine, not a generic DSL
//! runtime: a rule matches on an optional key and/or value, and its actions
//! either rewrite the *input* tag list (so later rules in the same file see
//! the change) or append to a separate *output* list, which is the only
//! thing the attribute translation in `osm.rs` ever reads.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// An ordered key/value tag list. Deliberately not a map: a tag set can
/// carry the same key twice until a `Set`/`Unset` rule normalises it, and
/// rule matching needs to see every occurrence.
pub type TagList = Vec<(String, String)>;

pub fn modify_tag(tags: &mut TagList, k: &str, v: &str) {
    if let Some(entry) = tags.iter_mut().find(|(ek, _)| ek == k) {
        entry.1 = v.to_string();
    } else {
        tags.push((k.to_string(), v.to_string()));
    }
}

pub fn delete_tag(tags: &mut TagList, k: &str) {
    tags.retain(|(ek, _)| ek != k);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Set,
    Unset,
    Output,
    LogError,
}

#[derive(Debug, Clone)]
struct TaggingAction {
    action: ActionKind,
    k: Option<String>,
    v: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaggingRule {
    k: Option<String>,
    v: Option<String>,
    actions: Vec<TaggingAction>,
}

#[derive(Debug, Clone, Default)]
pub struct TaggingRules {
    pub nodes: Vec<TaggingRule>,
    pub ways: Vec<TaggingRule>,
    pub relations: Vec<TaggingRule>,
}

impl TaggingRules {
    /// A rule set with no configured tagging file: every input tag passes
    /// through to the output list unchanged. `osm.rs`'s own OSM-tag
    /// interpretation (ISTRUE/ISFALSE access values, `highway=*`, ...) then
    /// does all of the actual work. A shipped default `routino-tagging.xml`
    /// wasn't part of the retrieved sources, so this passthrough stands in
    /// for it.
    pub fn passthrough() -> Self {
        let rule = TaggingRule { k: None, v: None, actions: vec![TaggingAction { action: ActionKind::Output, k: None, v: None }] };
        TaggingRules { nodes: vec![rule.clone()], ways: vec![rule.clone()], relations: vec![rule] }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path).with_context(|| format!("reading tagging rules {}", path.display()))?;
        parse_tagging_xml(&xml).with_context(|| format!("parsing tagging rules {}", path.display()))
    }

    /// Runs every rule in file order against `input`, returning the
    /// accumulated output list. `Set`/`Unset` actions mutate `input` in
    /// place as they run, so a later rule in the same list can match
    /// against a tag an earlier rule just added or removed. `LogError`
    /// actions are reported through `on_error`.
    fn apply(rules: &[TaggingRule], input: &mut TagList, mut on_error: impl FnMut(&str, &str)) -> TagList {
        let mut output = TagList::new();
        for rule in rules {
            let matches: Vec<(String, String)> = input
                .iter()
                .filter(|(k, v)| match (&rule.k, &rule.v) {
                    (Some(rk), Some(rv)) => k == rk && v == rv,
                    (Some(rk), None) => k == rk,
                    (None, Some(rv)) => v == rv,
                    (None, None) => true,
                })
                .cloned()
                .collect();

            for (mk, mv) in matches {
                for action in &rule.actions {
                    let k = action.k.as_deref().unwrap_or(&mk);
                    let v = action.v.as_deref().unwrap_or(&mv);
                    match action.action {
                        ActionKind::Set => modify_tag(input, k, v),
                        ActionKind::Unset => delete_tag(input, k),
                        ActionKind::Output => modify_tag(&mut output, k, v),
                        ActionKind::LogError => on_error(k, v),
                    }
                }
            }
        }
        output
    }

    pub fn apply_node(&self, input: &mut TagList, on_error: impl FnMut(&str, &str)) -> TagList {
        Self::apply(&self.nodes, input, on_error)
    }
    pub fn apply_way(&self, input: &mut TagList, on_error: impl FnMut(&str, &str)) -> TagList {
        Self::apply(&self.ways, input, on_error)
    }
    pub fn apply_relation(&self, input: &mut TagList, on_error: impl FnMut(&str, &str)) -> TagList {
        Self::apply(&self.relations, input, on_error)
    }
}

fn attr_value(e: &quick_xml::events::BytesStart, name: &str) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() == name.as_bytes() {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parses a `<routino-tagging><node>/<way>/<relation>>` rule file (§4.A
/// supplement). Each entity section holds a flat list of `<if k=".." v="..">`
/// rules, each with `<set>`/`<unset>`/`<output>`/`<logerror>` children.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Node,
    Way,
    Relation,
}

fn parse_tagging_xml(xml: &str) -> Result<TaggingRules> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;

    let mut rules = TaggingRules::default();
    let mut section = Section::None;
    let mut current_rule: Option<TaggingRule> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"node" => section = Section::Node,
                b"way" => section = Section::Way,
                b"relation" => section = Section::Relation,
                b"if" => current_rule = Some(TaggingRule { k: attr_value(&e, "k")?, v: attr_value(&e, "v")?, actions: Vec::new() }),
                b"set" => {
                    if let Some(rule) = current_rule.as_mut() {
                        rule.actions.push(TaggingAction { action: ActionKind::Set, k: attr_value(&e, "k")?, v: attr_value(&e, "v")? });
                    }
                }
                b"unset" => {
                    if let Some(rule) = current_rule.as_mut() {
                        rule.actions.push(TaggingAction { action: ActionKind::Unset, k: attr_value(&e, "k")?, v: attr_value(&e, "v")? });
                    }
                }
                b"output" => {
                    if let Some(rule) = current_rule.as_mut() {
                        rule.actions.push(TaggingAction { action: ActionKind::Output, k: attr_value(&e, "k")?, v: attr_value(&e, "v")? });
                    }
                }
                b"logerror" => {
                    if let Some(rule) = current_rule.as_mut() {
                        rule.actions.push(TaggingAction { action: ActionKind::LogError, k: attr_value(&e, "k")?, v: attr_value(&e, "v")? });
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"if" => {
                    if let Some(rule) = current_rule.take() {
                        match section {
                            Section::Node => rules.nodes.push(rule),
                            Section::Way => rules.ways.push(rule),
                            Section::Relation => rules.relations.push(rule),
                            Section::None => {}
                        }
                    }
                }
                b"node" | b"way" | b"relation" => section = Section::None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_copies_every_tag_unchanged() {
        let rules = TaggingRules::passthrough();
        let mut input = vec![("highway".to_string(), "residential".to_string())];
        let output = rules.apply_way(&mut input, |_, _| {});
        assert_eq!(output, vec![("highway".to_string(), "residential".to_string())]);
    }

    #[test]
    fn set_action_mutates_input_for_later_rules_in_the_same_file() {
        let rules = TaggingRules {
            nodes: vec![
                TaggingRule {
                    k: Some("old".into()),
                    v: None,
                    actions: vec![TaggingAction { action: ActionKind::Set, k: Some("highway".into()), v: Some("residential".into()) }],
                },
                TaggingRule { k: Some("highway".into()), v: None, actions: vec![TaggingAction { action: ActionKind::Output, k: None, v: None }] },
            ],
            ways: vec![],
            relations: vec![],
        };
        let mut input = vec![("old".to_string(), "yes".to_string())];
        let output = rules.apply_node(&mut input, |_, _| {});
        assert_eq!(output, vec![("highway".to_string(), "residential".to_string())]);
    }

    #[test]
    fn unset_action_removes_tag_from_input() {
        let rules = TaggingRules {
            nodes: vec![TaggingRule { k: Some("drop".into()), v: None, actions: vec![TaggingAction { action: ActionKind::Unset, k: Some("drop".into()), v: None }] }],
            ways: vec![],
            relations: vec![],
        };
        let mut input = vec![("drop".to_string(), "me".to_string()), ("keep".to_string(), "yes".to_string())];
        rules.apply_node(&mut input, |_, _| {});
        assert_eq!(input, vec![("keep".to_string(), "yes".to_string())]);
    }

    #[test]
    fn parses_a_minimal_rule_file() {
        let xml = r#"<?xml version="1.0"?>
<routino-tagging>
  <node>
    <if k="highway" v="mini_roundabout">
      <output k="highway" v="mini_roundabout"/>
    </if>
  </node>
  <way>
    <if>
      <output/>
    </if>
  </way>
</routino-tagging>"#;
        let rules = parse_tagging_xml(xml).unwrap();
        assert_eq!(rules.nodes.len(), 1);
        assert_eq!(rules.ways.len(), 1);
        let mut input = vec![("highway".to_string(), "mini_roundabout".to_string())];
        let output = rules.apply_node(&mut input, |_, _| {});
        assert_eq!(output, vec![("highway".to_string(), "mini_roundabout".to_string())]);
    }
}
