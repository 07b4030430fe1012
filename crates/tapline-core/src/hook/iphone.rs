//! Locators for the iPhone build of the sample app.

pub mod main_screen {
    use crate::hook::Hook;

    /// Text field for the first addend.
    pub const INTEGER_A_TEXT_FIELD: Hook = Hook::from_static("mainWindow.textFields()[0]");
    /// Text field for the second addend.
    pub const INTEGER_B_TEXT_FIELD: Hook = Hook::from_static("mainWindow.textFields()[1]");
    pub const COMPUTE_SUM_BUTTON: Hook = Hook::from_static("mainWindow.buttons()[\"Compute Sum\"]");
    /// Label showing the sum once computed.
    pub const RESULT_LABEL: Hook = Hook::from_static("mainWindow.staticTexts()[0]");
}
