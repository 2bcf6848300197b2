//! Builders for the `Core.Input` actions understood by the remote server.
//!
//! Every builder returns an [`Action`]; wrap it with
//! [`Packet::run`](crate::protocol::packet::Packet::run) before sending.
//! All arguments are positional extras (empty key) so that their order on
//! the wire is exactly the order they were pushed.

use crate::domain::input::MouseButton;
use crate::protocol::packet::Action;

/// Namespace of the built-in input actions.
pub const TARGET_INPUT: &str = "Core.Input";

/// Action names.
pub mod names {
    pub const MOVE_BY: &str = "MoveBy";
    pub const CLICK: &str = "Click";
    pub const TEXT: &str = "Text";
    pub const PRESS: &str = "Press";
    pub const STROKE: &str = "Stroke";
    pub const SCROLL: &str = "Scroll";
    pub const HSCROLL: &str = "HScroll";
}

/// Relative pointer move.
pub fn move_by(dx: i32, dy: i32) -> Action {
    Action::new(names::MOVE_BY, TARGET_INPUT).arg(dx).arg(dy)
}

/// Single click of `button`.
pub fn click(button: MouseButton) -> Action {
    Action::new(names::CLICK, TARGET_INPUT).arg(button.wire_name())
}

/// Types `text` verbatim on the server.
pub fn text(text: &str) -> Action {
    Action::new(names::TEXT, TARGET_INPUT).arg(text)
}

/// Vertical wheel scroll; positive scrolls down.
pub fn scroll(delta: i32) -> Action {
    Action::new(names::SCROLL, TARGET_INPUT).arg(delta)
}

/// Horizontal wheel scroll; positive scrolls right.
pub fn hscroll(delta: i32) -> Action {
    Action::new(names::HSCROLL, TARGET_INPUT).arg(delta)
}

/// Presses `key` while holding `modifiers`.
///
/// Without modifiers this is a `Press` with the single key.  With modifiers it
/// becomes a `Stroke` whose positional extras list the modifiers in the order
/// given (duplicates dropped) followed by the key, which is the order the
/// server presses them in.
///
/// ```rust
/// use remote_core::protocol::commands::press;
/// use remote_core::protocol::packet::ExtraValue;
///
/// let action = press("c", &["ctrl"]);
/// assert_eq!(action.name, "Stroke");
/// let keys: Vec<_> = action.extras.positional().filter_map(ExtraValue::as_str).collect();
/// assert_eq!(keys, ["CTRL", "C"]);
/// ```
pub fn press<S: AsRef<str>>(key: &str, modifiers: &[S]) -> Action {
    let key = normalize_key_name(key);
    let mut seen: Vec<String> = Vec::with_capacity(modifiers.len());
    for m in modifiers {
        let m = normalize_modifier_name(m.as_ref());
        if !m.is_empty() && !seen.contains(&m) {
            seen.push(m);
        }
    }

    if seen.is_empty() {
        return Action::new(names::PRESS, TARGET_INPUT).arg(key);
    }
    let mut action = Action::new(names::STROKE, TARGET_INPUT);
    for m in seen {
        action = action.arg(m);
    }
    action.arg(key)
}

/// Canonical wire name for a key: trimmed and upper-cased.
pub fn normalize_key_name(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

/// Canonical wire name for a modifier, folding common aliases.
pub fn normalize_modifier_name(modifier: &str) -> String {
    let upper = normalize_key_name(modifier);
    match upper.as_str() {
        "CTRL" | "CONTROL" => "CTRL".to_string(),
        "SHIFT" => "SHIFT".to_string(),
        "ALT" | "OPTION" => "ALT".to_string(),
        "WIN" | "CMD" | "COMMAND" | "SUPER" | "META" | "LWIN" => "LWIN".to_string(),
        _ => upper,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::ExtraValue;

    fn positional(action: &Action) -> Vec<ExtraValue> {
        action.extras.positional().cloned().collect()
    }

    #[test]
    fn test_press_with_ctrl_builds_stroke_in_press_order() {
        // Act
        let action = press("c", &["ctrl"]);

        // Assert
        assert_eq!(action.name, "Stroke");
        assert_eq!(action.target, TARGET_INPUT);
        let entries: Vec<(&str, &ExtraValue)> = action.extras.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("", &ExtraValue::String("CTRL".into())),
                ("", &ExtraValue::String("C".into())),
            ]
        );
    }

    #[test]
    fn test_press_without_modifiers_is_plain_press() {
        let action = press("enter", &[] as &[&str]);
        assert_eq!(action.name, "Press");
        assert_eq!(positional(&action), vec![ExtraValue::String("ENTER".into())]);
    }

    #[test]
    fn test_press_keeps_modifier_order_and_drops_duplicates() {
        let action = press("t", &["shift", "Control", "ctrl"]);
        assert_eq!(
            positional(&action),
            vec![
                ExtraValue::String("SHIFT".into()),
                ExtraValue::String("CTRL".into()),
                ExtraValue::String("T".into()),
            ]
        );
    }

    #[test]
    fn test_modifier_aliases() {
        assert_eq!(normalize_modifier_name("cmd"), "LWIN");
        assert_eq!(normalize_modifier_name(" win "), "LWIN");
        assert_eq!(normalize_modifier_name("option"), "ALT");
        assert_eq!(normalize_modifier_name("hyper"), "HYPER");
    }

    #[test]
    fn test_move_by_carries_both_deltas() {
        let action = move_by(-5, 12);
        assert_eq!(action.name, "MoveBy");
        assert_eq!(
            positional(&action),
            vec![ExtraValue::Integer(-5), ExtraValue::Integer(12)]
        );
    }

    #[test]
    fn test_click_uses_button_wire_name() {
        let action = click(MouseButton::Right);
        assert_eq!(positional(&action), vec![ExtraValue::String("right".into())]);
    }

    #[test]
    fn test_text_scroll_and_hscroll() {
        assert_eq!(text("héllo").name, "Text");
        assert_eq!(positional(&scroll(3)), vec![ExtraValue::Integer(3)]);
        assert_eq!(hscroll(-2).name, "HScroll");
    }
}
