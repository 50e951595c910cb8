use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextTab,
    PrevTab,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    GPrefix,
    ToggleHelp,
    Enter,
    Back,
    ShowLogs,
    NextComponent,
    ShowTemplate,
    DeleteSelected,
    Refresh,
    StartCommand,
    StartFilter,
    SubmitInput,
    CancelInput,
    Backspace,
    DeleteWord,
    InputChar(char),
    ConfirmYes,
    ConfirmNo,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Command | InputMode::Filter => map_input_mode_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Left | KeyCode::BackTab => Some(Action::PrevTab),
        KeyCode::Right | KeyCode::Tab => Some(Action::NextTab),
        KeyCode::Char('h') if key.modifiers.is_empty() => Some(Action::PrevTab),
        KeyCode::Char('g') => Some(Action::GPrefix),
        KeyCode::Char('G') => Some(Action::Bottom),
        KeyCode::Home => Some(Action::Top),
        KeyCode::End => Some(Action::Bottom),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('/') => Some(Action::StartFilter),
        KeyCode::Char(':') => Some(Action::StartCommand),
        KeyCode::Char(';') if key.modifiers.contains(KeyModifiers::SHIFT) => {
            Some(Action::StartCommand)
        }
        KeyCode::Char('l') if key.modifiers.is_empty() => Some(Action::ShowLogs),
        KeyCode::Char('c') if key.modifiers.is_empty() => Some(Action::NextComponent),
        KeyCode::Char('t') if key.modifiers.is_empty() => Some(Action::ShowTemplate),
        KeyCode::Char('x') | KeyCode::Delete => Some(Action::DeleteSelected),
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmYes),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::ConfirmNo),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Char('m') | KeyCode::Char('j')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(Action::Enter)
        }
        KeyCode::Esc | KeyCode::Backspace => Some(Action::Back),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::PageDown)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::PageUp),
        _ => None,
    }
}

fn map_input_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Char('m') | KeyCode::Char('j')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(Action::SubmitInput)
        }
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::DeleteWord)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key};
    use crate::app::InputMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn normal_mode_maps_quit() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let action = map_key(InputMode::Normal, key);
        assert_eq!(action, Some(Action::Quit));
    }

    #[test]
    fn input_mode_maps_char() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let action = map_key(InputMode::Command, key);
        assert_eq!(action, Some(Action::InputChar('q')));
    }

    #[test]
    fn input_mode_rejects_ctrl_c() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let action = map_key(InputMode::Filter, key);
        assert_eq!(action, None);
    }

    #[test]
    fn plain_c_cycles_components_but_ctrl_c_quits() {
        let plain = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        let ctrl = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Normal, plain), Some(Action::NextComponent));
        assert_eq!(map_key(InputMode::Normal, ctrl), Some(Action::Quit));
    }

    #[test]
    fn normal_mode_maps_x_and_delete_to_delete_selected() {
        for code in [KeyCode::Char('x'), KeyCode::Delete] {
            let key = KeyEvent::new(code, KeyModifiers::NONE);
            assert_eq!(map_key(InputMode::Normal, key), Some(Action::DeleteSelected));
        }
    }

    #[test]
    fn tabs_follow_arrow_and_tab_keys() {
        let right = KeyEvent::new(KeyCode::Right, KeyModifiers::NONE);
        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE);
        let back_tab = KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT);
        assert_eq!(map_key(InputMode::Normal, right), Some(Action::NextTab));
        assert_eq!(map_key(InputMode::Normal, tab), Some(Action::NextTab));
        assert_eq!(map_key(InputMode::Normal, back_tab), Some(Action::PrevTab));
    }

    #[test]
    fn input_mode_maps_ctrl_m_and_ctrl_j_to_submit() {
        let ctrl_m = KeyEvent::new(KeyCode::Char('m'), KeyModifiers::CONTROL);
        let ctrl_j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::CONTROL);
        assert_eq!(
            map_key(InputMode::Command, ctrl_m),
            Some(Action::SubmitInput)
        );
        assert_eq!(
            map_key(InputMode::Command, ctrl_j),
            Some(Action::SubmitInput)
        );
    }

    #[test]
    fn normal_mode_maps_uppercase_confirmation_keys() {
        let yes = KeyEvent::new(KeyCode::Char('Y'), KeyModifiers::SHIFT);
        let no = KeyEvent::new(KeyCode::Char('N'), KeyModifiers::SHIFT);
        assert_eq!(map_key(InputMode::Normal, yes), Some(Action::ConfirmYes));
        assert_eq!(map_key(InputMode::Normal, no), Some(Action::ConfirmNo));
    }

    #[test]
    fn normal_mode_maps_shift_semicolon_to_command() {
        let key = KeyEvent::new(KeyCode::Char(';'), KeyModifiers::SHIFT);
        let action = map_key(InputMode::Normal, key);
        assert_eq!(action, Some(Action::StartCommand));
    }

    #[test]
    fn ctrl_w_deletes_a_word_while_typing() {
        let key = KeyEvent::new(KeyCode::Char('w'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Command, key), Some(Action::DeleteWord));
    }
}
