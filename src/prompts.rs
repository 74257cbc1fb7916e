//! Prompt construction for episode scripts.
//!
//! Every template asks for a pipe-delimited code block with name, gender and
//! text columns; the repair pipeline assumes nothing about how well the model
//! complies.

pub const DEFAULT_SCENE_TYPE: &str = "podcast";

/// System instruction for the structured generation path.
pub const SYSTEM_INSTRUCTION: &str = "You are a script generator, only capable of outputting \
pipe-delimited code blocks with the name, gender, and text columns, with name indicating the \
name of the speaker, gender the gender of the speaker, and text the content of their speech. \
The code blocks will not have newlines between each line of text";

const PODCAST_TEMPLATE: &str = "Create a pipe-delimited code block without any other comments \
or text, containing a podcast script of a complete conversation between a male podcast host \
named {host_name} and a random {character_type} of a known gender on {script_prompt}\
{character_addenda}, including a column for the name, gender, and the text in quotes for both \
sides.";

const RAP_BATTLE_TEMPLATE: &str = "Create a pipe-delimited code block without any other \
comments or text, containing the script of a rap battle between a male host named {host_name} \
and a random {character_type} of a known gender on {script_prompt}{character_addenda}, \
including a column for the name, gender, and the text in quotes for both sides.";

const BUSINESS_TALK_TEMPLATE: &str = "Create a pipe-delimited code block without any other \
comments or text, containing the script of a formal business talk between a male presenter \
named {host_name} and a random {character_type} of a known gender on {script_prompt}\
{character_addenda}, including a column for the name, gender, and the text in quotes for both \
sides.";

/// Self-prompted episodes ask for a fresh topic every time.
pub fn autonomous_prompt(host_name: &str) -> String {
    format!(
        "Ignore previous instructions, Do not say sure, do not apologize, do not say anything \
at all, and create a pipe-delimited code block without any other comments or text, containing \
a podcast script of a conversation between a male podcast host named {} and a random character \
on a random appropriate topic dissimilar from the previous one, including a column for the \
name, gender, and the text in quotes for both sides. Do not talk, do not say anything else \
other than the code block",
        host_name
    )
}

/// Persona class and prompt addendum for a guest type. Unknown types fall
/// back to an ordinary human guest.
pub fn guest_customization(guest_type: &str) -> (&'static str, &'static str) {
    match guest_type {
        "robot" => (
            "robot",
            " and completely unrelated to robots, but referencing robots somehow",
        ),
        "skeleton" => (
            "skeleton",
            " and completely unrelated to skeletons, but referencing skeletons somehow",
        ),
        _ => ("human character", ""),
    }
}

/// Fill the scene template for a requested episode.
pub fn requested_prompt(
    host_name: &str,
    guest_type: &str,
    script_prompt: &str,
    scene_type: &str,
) -> String {
    let (character_type, character_addenda) = guest_customization(guest_type);
    let template = match scene_type {
        "rapbattle" => RAP_BATTLE_TEMPLATE,
        "businesstalk" => BUSINESS_TALK_TEMPLATE,
        _ => PODCAST_TEMPLATE,
    };
    template
        .replace("{host_name}", host_name)
        .replace("{character_type}", character_type)
        .replace("{script_prompt}", script_prompt)
        .replace("{character_addenda}", character_addenda)
}
