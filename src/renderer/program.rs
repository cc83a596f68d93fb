//! `*.prog` files: which shaders a program links, when it applies and which
//! data feeds its texture-coordinate channels.

use std::collections::BTreeMap;

use super::backend::ProgramHandle;
use super::condition::{Condition, ConditionGroup, ConditionSingle};
use crate::assets::{AssetGraph, BlockId};
use crate::errors::{Result, ViewerError};
use crate::properties::TexturingProperty;

/// Texcoord semantics besides the texturing slot names.
pub const TANGENTS: &str = "tangents";
pub const BITANGENTS: &str = "bitangents";

/// A parsed program description plus its link state.
#[derive(Debug, Clone)]
pub struct Program {
    name: String,
    shaders: Vec<String>,
    conditions: ConditionGroup,
    /// Unit to semantic, iterated in unit order.
    texcoords: BTreeMap<u32, String>,
    pub(crate) handle: Option<ProgramHandle>,
}

impl Program {
    /// Parses a program file. Lines that are none of `shaders`,
    /// `checkgroup`, `check` or `texcoords` are ignored.
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let err = |message: String| ViewerError::ProgramParse {
            program: name.to_owned(),
            message,
        };

        let mut shaders = Vec::new();
        let mut texcoords = BTreeMap::new();
        // the bottom entry is the implicit AND group of the whole file
        let mut groups = vec![ConditionGroup::new(false)];

        for line in text.lines().map(str::trim) {
            if line.starts_with("shaders") {
                shaders.extend(line.split_whitespace().skip(1).map(str::to_owned));
            } else if line.starts_with("checkgroup") {
                let words: Vec<&str> = line.split_whitespace().collect();
                match words.get(1).copied() {
                    Some("begin") => groups.push(ConditionGroup::new(words.get(2) == Some(&"or"))),
                    Some("end") => {
                        if groups.len() < 2 {
                            return Err(err("mismatching checkgroup end tag".into()));
                        }
                        if let Some(group) = groups.pop()
                            && let Some(parent) = groups.last_mut()
                        {
                            parent.add(Condition::Group(group));
                        }
                    }
                    _ => return Err(err("expected begin or end after checkgroup".into())),
                }
            } else if let Some(rest) = line.strip_prefix("check") {
                let rest = rest.trim();
                let (rest, invert) = match rest.strip_prefix("not ") {
                    Some(r) => (r.trim(), true),
                    None => (rest, false),
                };
                if let Some(top) = groups.last_mut() {
                    top.add(Condition::Single(ConditionSingle::parse(rest, invert)));
                }
            } else if let Some(rest) = line.strip_prefix("texcoords") {
                let mut words = rest.split_whitespace();
                let unit = words.next().and_then(|u| u.parse::<u32>().ok());
                let id = words.next().map(str::to_lowercase).unwrap_or_default();
                let Some(unit) = unit.filter(|_| !id.is_empty()) else {
                    return Err(err("malformed texcoord tag".into()));
                };
                if id != TANGENTS && id != BITANGENTS && TexturingProperty::get_id(&id).is_none() {
                    return Err(err(format!("texcoord tag refers to unknown texture id '{id}'")));
                }
                if texcoords.contains_key(&unit) {
                    return Err(err(format!("texture unit {unit} is assigned twice")));
                }
                texcoords.insert(unit, id);
            }
        }

        // an unterminated group still counts
        while groups.len() > 1 {
            if let Some(group) = groups.pop()
                && let Some(parent) = groups.last_mut()
            {
                parent.add(Condition::Group(group));
            }
        }

        Ok(Self {
            name: name.to_owned(),
            shaders,
            conditions: groups.pop().unwrap_or_default(),
            texcoords,
            handle: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn shaders(&self) -> &[String] {
        &self.shaders
    }

    #[must_use]
    pub fn conditions(&self) -> &ConditionGroup {
        &self.conditions
    }

    pub fn texcoords(&self) -> impl Iterator<Item = (u32, &str)> {
        self.texcoords.iter().map(|(u, s)| (*u, s.as_str()))
    }

    /// Linked and usable.
    #[inline]
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    #[must_use]
    pub fn accepts(&self, graph: &dyn AssetGraph, blocks: &[BlockId]) -> bool {
        self.conditions.eval(graph, blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROG: &str = "
shaders sk_default.vert sk_default.frag
checkgroup begin or
    check BSLightingShaderProperty/Skyrim Shader Type == 1
    check not NiAlphaProperty
checkgroup end
check HEADER/Version >= 0x14020007
texcoords 0 base
texcoords 1 tangents
";

    #[test]
    fn parses_all_directives() {
        let p = Program::parse("sk_default.prog", PROG).unwrap();
        assert_eq!(p.shaders(), ["sk_default.vert", "sk_default.frag"]);
        assert_eq!(p.conditions().conditions.len(), 2);
        match &p.conditions().conditions[0] {
            Condition::Group(g) => {
                assert!(g.or);
                assert_eq!(g.conditions.len(), 2);
            }
            Condition::Single(_) => panic!("expected group"),
        }
        let tc: Vec<_> = p.texcoords().collect();
        assert_eq!(tc, vec![(0, "base"), (1, "tangents")]);
        assert!(!p.is_usable());
    }

    #[test]
    fn stray_end_is_rejected() {
        let e = Program::parse("bad.prog", "checkgroup end").unwrap_err();
        assert!(e.to_string().contains("mismatching"));
    }

    #[test]
    fn checkgroup_needs_begin_or_end() {
        assert!(Program::parse("bad.prog", "checkgroup open").is_err());
    }

    #[test]
    fn texcoord_tags_are_validated() {
        assert!(Program::parse("p", "texcoords x base").is_err());
        assert!(Program::parse("p", "texcoords 0").is_err());
        assert!(Program::parse("p", "texcoords 0 shiny").is_err());
        assert!(Program::parse("p", "texcoords 0 base\ntexcoords 0 dark").is_err());
        assert!(Program::parse("p", "texcoords 0 BASE").is_ok());
    }
}
