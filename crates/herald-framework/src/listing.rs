//! Command listings grouped by module.

use std::collections::BTreeMap;

use serde::Serialize;

/// Heading for commands that belong to no module.
pub const MISC_MODULE: &str = "Misc";

/// The commands of one module visible to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleListing {
    /// Module name, or [`MISC_MODULE`].
    pub module: String,
    /// Command names, sorted.
    pub commands: Vec<String>,
}

/// Groups `(module, command)` pairs into sorted listings.
///
/// Modules without commands never appear, so an empty "Misc" bucket is
/// omitted.
pub fn group<'a, I>(entries: I) -> Vec<ModuleListing>
where
    I: IntoIterator<Item = (Option<&'a str>, &'a str)>,
{
    let mut modules: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (module, command) in entries {
        modules
            .entry(module.unwrap_or(MISC_MODULE))
            .or_default()
            .push(command.to_string());
    }

    modules
        .into_iter()
        .map(|(module, mut commands)| {
            commands.sort();
            ModuleListing {
                module: module.to_string(),
                commands,
            }
        })
        .collect()
}

/// Renders listings as `**Module**` headings followed by comma-separated names.
pub fn render(listings: &[ModuleListing]) -> String {
    let mut output = String::new();
    for listing in listings {
        output.push_str("**");
        output.push_str(&listing.module);
        output.push_str("**\n");
        output.push_str(&listing.commands.join(", "));
        output.push_str("\n\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_and_render() {
        let listings = group([
            (Some("Fun"), "roll"),
            (None, "ping"),
            (Some("Fun"), "dice"),
            (Some("Admin"), "prefix"),
        ]);

        assert_eq!(
            listings,
            vec![
                ModuleListing {
                    module: "Admin".into(),
                    commands: vec!["prefix".into()],
                },
                ModuleListing {
                    module: "Fun".into(),
                    commands: vec!["dice".into(), "roll".into()],
                },
                ModuleListing {
                    module: "Misc".into(),
                    commands: vec!["ping".into()],
                },
            ]
        );
        assert_eq!(
            render(&listings),
            "**Admin**\nprefix\n\n**Fun**\ndice, roll\n\n**Misc**\nping\n\n"
        );
    }

    #[test]
    fn test_empty_misc_is_omitted() {
        let listings = group([(Some("Fun"), "roll")]);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].module, "Fun");
        assert_eq!(render(&group(std::iter::empty())), "");
    }
}
