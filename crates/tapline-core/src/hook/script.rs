//! Script text for each client action.
//!
//! These builders are pure: they only format UIAutomation JavaScript. The
//! host evaluates each line of a command separately and reports one result
//! per line, so every builder produces exactly one line.

use super::Hook;

/// String form of an element lookup that matched nothing.
pub const NIL_ELEMENT: &str = "[object UIAElementNil]";

/// Statement that ends the host's run loop.
pub const STOP_RUN_LOOP: &str = "runLoop=false;";

pub fn get(hook: &Hook) -> String {
    format!("{hook};")
}

pub fn tap(hook: &Hook) -> String {
    format!("{hook}.tap();")
}

pub fn scroll_to(hook: &Hook) -> String {
    format!("{hook}.scrollToVisible();")
}

/// `value` is embedded in a double-quoted literal; its quotes are escaped.
pub fn set_value(hook: &Hook, value: &str) -> String {
    format!("{hook}.setValue(\"{}\");", escape_quotes(value))
}

pub fn get_value(hook: &Hook) -> String {
    format!("{hook}.value();")
}

pub fn get_name(hook: &Hook) -> String {
    format!("{hook}.name();")
}

/// Host-side busy wait, bounded by the host's own clock, that evaluates to
/// `true` once the locator yields a non-nil element.
pub fn wait_for_not_null(hook: &Hook, timeout_ms: u64) -> String {
    format!(
        "var result = false; var startTime = new Date().getTime(); \
         while(new Date().getTime() - startTime < {timeout_ms}) {{ \
         try {{ var e = {hook}; \
         if (e != null && e.toString() != \"{NIL_ELEMENT}\") {{ result = true; startTime = 0; }} \
         }} catch(e) {{ }} }} result;"
    )
}

pub fn check_if_null(hook: &Hook) -> String {
    format!("{hook} == null || {hook}.toString() == \"{NIL_ELEMENT}\"")
}

pub fn delay(seconds: f64) -> String {
    format!("delay({seconds});")
}

pub fn stop_run_loop() -> String {
    STOP_RUN_LOOP.to_owned()
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}
