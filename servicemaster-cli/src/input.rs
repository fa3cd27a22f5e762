//! Translate crossterm events into dashboard input

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use servicemaster_core::{Input, Key};

pub fn translate(event: Event) -> Option<Input> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => map_key(key).map(Input::Key),
        Event::Resize(w, h) => Some(Input::Resize(w, h)),
        _ => None,
    }
}

fn map_key(key: KeyEvent) -> Option<Key> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Key::CtrlC);
    }
    let mapped = match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::F(n) => Key::F(n),
        _ => return None,
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_ctrl_c_is_quit() {
        assert_eq!(
            translate(press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Input::Key(Key::CtrlC))
        );
        assert_eq!(
            translate(press(KeyCode::Char('c'), KeyModifiers::NONE)),
            Some(Input::Key(Key::Char('c')))
        );
    }

    #[test]
    fn test_function_and_navigation_keys() {
        assert_eq!(
            translate(press(KeyCode::F(3), KeyModifiers::NONE)),
            Some(Input::Key(Key::F(3)))
        );
        assert_eq!(
            translate(press(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(Input::Key(Key::BackTab))
        );
        assert_eq!(translate(press(KeyCode::Home, KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_release_events_ignored() {
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(translate(release), None);
    }

    #[test]
    fn test_resize() {
        assert_eq!(translate(Event::Resize(120, 40)), Some(Input::Resize(120, 40)));
        assert_eq!(translate(Event::FocusGained), None);
    }
}
