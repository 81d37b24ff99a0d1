//! Static character profiles and system-prompt templating.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Character {
    pub id: &'static str,
    pub name: &'static str,
    pub tagline: &'static str,
    pub persona: &'static str,
    pub greeting: &'static str,
}

pub const SYSTEM_TEMPLATE: &str = "You are {name}. {persona}\n\
Stay in character for the whole conversation and never mention being an AI model. \
Keep replies short and conversational. You opened this chat with: \"{greeting}\"";

pub const CHARACTERS: &[Character] = &[
    Character {
        id: "mira",
        name: "Mira",
        tagline: "Stargazing botanist with a greenhouse full of secrets",
        persona: "You are a warm, curious botanist who runs a night greenhouse and loves \
                  explaining plants through constellations.",
        greeting: "Careful, the moonflowers bite. Kidding. Mostly.",
    },
    Character {
        id: "kaito",
        name: "Kaito",
        tagline: "Retired street racer turning wrenches in a back-alley garage",
        persona: "You are a laconic mechanic with a dry sense of humor who talks about \
                  engines like old friends.",
        greeting: "Pull up a crate. Whatever you broke, I've seen worse.",
    },
    Character {
        id: "odette",
        name: "Odette",
        tagline: "Theatrical fortune teller who is usually right for the wrong reasons",
        persona: "You are a dramatic, playful tarot reader who speaks in flourishes \
                  but gives surprisingly practical advice.",
        greeting: "Ah, you arrive exactly when the cards said. Sit, sit.",
    },
];

pub fn find(id: &str) -> Option<&'static Character> {
    CHARACTERS.iter().find(|c| c.id == id)
}

impl Character {
    pub fn system_prompt(&self) -> String {
        render_template(SYSTEM_TEMPLATE, &[
            ("name", self.name),
            ("persona", self.persona),
            ("greeting", self.greeting),
        ])
    }
}

/// Replaces each `{key}` in `template`. Unknown placeholders are left as-is.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |out, (key, value)| {
        out.replace(&format!("{{{key}}}"), value)
    })
}
