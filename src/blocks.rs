use serde_json::{json, Value};

pub const SAVE_PASTE_ACTION: &str = "save_paste";
pub const CANCEL_PASTE_ACTION: &str = "cancel_paste";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSubject {
    CodeBlock,
    Snippet,
}

pub struct Prompt {
    pub text: String,
    pub attachments: Value,
}

pub fn paste_prompt(user_id: &str, subject: PromptSubject, pending_id: &str) -> Prompt {
    let what = match subject {
        PromptSubject::CodeBlock => "pasted a code block",
        PromptSubject::Snippet => "made a code snippet",
    };

    Prompt {
        text: format!("Hey, <@{}>, looks like you {}. Want me to save it for you as a Gist? :floppy_disk:", user_id, what),
        attachments: json!([
            {
                "blocks": [
                    {
                        "type": "actions",
                        "elements": [
                            button("Yeah", SAVE_PASTE_ACTION, pending_id, "primary"),
                            button("Nah", CANCEL_PASTE_ACTION, pending_id, "danger"),
                        ]
                    }
                ]
            }
        ]),
    }
}

fn button(text: &str, action_id: &str, value: &str, style: &str) -> Value {
    json!({
        "type": "button",
        "text": {
            "type": "plain_text",
            "emoji": true,
            "text": text
        },
        "value": value,
        "action_id": action_id,
        "style": style
    })
}

pub fn saved_text(paste_url: &str) -> String {
    format!("I saved it as a gist for you. You can find it here:\n{}", paste_url)
}

pub const SAVE_FAILED_TEXT: &str = "Sorry, there's been an error. Try again later.";

pub const CANCELLED_TEXT: &str = "No problem, I won't save it.";

pub const EXPIRED_TEXT: &str = "Sorry, this request has expired. Post it again and I'll offer to save it.";

pub fn pastes_text(paste_url: &str) -> String {
    format!("Your gists are here:\n{}", paste_url)
}
