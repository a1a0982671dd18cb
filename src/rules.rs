#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    OfferPaste,
    ListPastes,
}

/// Literal, case sensitive substring trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRule {
    pub name: &'static str,
    pub pattern: String,
    pub intent: Intent,
}

impl TriggerRule {
    pub fn new(name: &'static str, pattern: impl Into<String>, intent: Intent) -> TriggerRule {
        TriggerRule { name, pattern: pattern.into(), intent }
    }

    pub fn matches(&self, text: &str) -> bool {
        !self.pattern.is_empty() && text.contains(self.pattern.as_str())
    }
}

/// Ordered rule list. Every matching rule fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    rules: Vec<TriggerRule>,
}

impl Rules {
    pub fn new(rules: Vec<TriggerRule>) -> Rules {
        Rules { rules }
    }

    pub fn default_with_keyword(list_pastes_keyword: &str) -> Rules {
        Rules::new(vec![
            TriggerRule::new("code_block", "```", Intent::OfferPaste),
            TriggerRule::new("list_pastes", list_pastes_keyword, Intent::ListPastes),
        ])
    }

    pub fn matching<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a TriggerRule> + 'a {
        self.rules.iter().filter(move |rule| rule.matches(text))
    }
}
