use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single line editor used for the live search query.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // in chars
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub changed: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.moved(self.curser_pos.saturating_sub(1)),
            (KeyCode::Right, _) => self.moved(self.curser_pos + 1),
            (KeyCode::Home, _) => self.moved(0),
            (KeyCode::End, _) => self.moved(usize::MAX),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.kill_line(),
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => self.insert(chr),
            _ => self.get(false),
        }
    }

    /// Start editing with `s` as content, curser at its end.
    pub fn set(&mut self, s: &str) {
        self.clear();
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn get(&self, changed: bool) -> InputResult {
        InputResult {
            input: self.current_input.clone(),
            finished: self.finished,
            canceled: self.canceled,
            changed,
            curser_pos: self.curser_pos,
        }
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get(false)
    }

    fn escape(&mut self) -> InputResult {
        self.canceled = true;
        self.finished = true;
        self.get(false)
    }

    fn insert(&mut self, chr: char) -> InputResult {
        let pos = self.bytepos(self.curser_pos);
        self.current_input.insert(pos, chr);
        self.curser_pos += 1;
        self.get(true)
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos == 0 {
            return self.get(false);
        }
        self.curser_pos -= 1;
        let pos = self.bytepos(self.curser_pos);
        self.current_input.remove(pos);
        self.get(true)
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos >= self.current_input.chars().count() {
            return self.get(false);
        }
        let pos = self.bytepos(self.curser_pos);
        self.current_input.remove(pos);
        self.get(true)
    }

    fn kill_line(&mut self) -> InputResult {
        let changed = !self.current_input.is_empty();
        self.current_input.clear();
        self.curser_pos = 0;
        self.get(changed)
    }

    fn moved(&mut self, pos: usize) -> InputResult {
        self.curser_pos = pos.min(self.current_input.chars().count());
        self.get(false)
    }

    fn bytepos(&self, char_pos: usize) -> usize {
        self.current_input
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
