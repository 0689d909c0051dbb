use crate::render::MarkupScheme;

const OUTPUT_TEMPLATE: &str = "\
--------------------------------------------------
SUMMARY:
  - Files modified: {files_modified}
  - One line summary of the changes
  - Insertions: {insertions}
  - Deletions: {deletions}

FILE CHANGES:
{file_changes}

DETAILS:
  file1:
    + {detailed_breakdown_additions}
    - {detailed_breakdown_deletions}
  ...
--------------------------------------------------
";

const BRACKET_RULES: &str = "\
IMPORTANT: For colored text, wrap spans in the following markers:

For additions (green text): [ADD]text here[/ADD]
For deletions (red text): [DEL]text here[/DEL]

Always close every marker you open and do not use any other color notation.";

const ANSI_RULES: &str = "\
IMPORTANT: For colored text, use the following ANSI escape codes with the full escape character prefix:

For additions (green text): \\033[32;1m text here \\033[0m
For deletions (red text): \\033[31;1m text here \\033[0m

Make sure to include the full '\\033' escape character prefix and always close with '\\033[0m' to reset the color.";

/// The instruction sent to the model. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn build(diff: &str, scheme: MarkupScheme) -> Self {
        let rules = match scheme {
            MarkupScheme::Brackets => BRACKET_RULES,
            MarkupScheme::Ansi => ANSI_RULES,
        };

        let mut s = String::with_capacity(diff.len() + OUTPUT_TEMPLATE.len() + 1024);
        s.push_str(
            "I'm going to show you the output of a git diff command. \
             Please explain these changes in a clear, concise way.\n\n",
        );
        s.push_str("Here's the git diff output:\n\n```\n");
        s.push_str(diff);
        s.push_str("\n```\n\n");
        s.push_str(
            "Be concise but include every file that was changed in DETAILS. \
             Use the format below and output plaintext without ```. \
             Only include SUMMARY, FILE CHANGES and DETAILS sections:\n\n```\n",
        );
        s.push_str(OUTPUT_TEMPLATE);
        s.push_str("```\n\n");
        s.push_str(rules);
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "diff --git a/f b/f\n+line\n";

    #[test]
    fn embeds_diff_and_template() {
        let p = Prompt::build(DIFF, MarkupScheme::Brackets);
        let s = p.as_str();
        assert!(s.contains(DIFF));
        for placeholder in ["{files_modified}", "{insertions}", "{deletions}", "{file_changes}"] {
            assert!(s.contains(placeholder), "missing {placeholder}");
        }
    }

    #[test]
    fn only_one_color_convention_per_prompt() {
        let brackets = Prompt::build(DIFF, MarkupScheme::Brackets);
        assert!(brackets.as_str().contains("[ADD]text here[/ADD]"));
        assert!(!brackets.as_str().contains("\\033"));

        let ansi = Prompt::build(DIFF, MarkupScheme::Ansi);
        assert!(ansi.as_str().contains("\\033[32;1m"));
        assert!(!ansi.as_str().contains("[ADD]"));
    }
}
