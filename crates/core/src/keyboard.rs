/// Keys the exam surface reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Enter,
    Space,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }

    fn any(self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// What a key press asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamCommand {
    Previous,
    Next,
    /// 0-based display position of the option.
    SelectOption(usize),
    ToggleReview,
    Submit,
    Pause,
}

/// Map a key press to a command. Gating by session status happens in the caller.
#[must_use]
pub fn command_for(key: Key, modifiers: Modifiers) -> Option<ExamCommand> {
    match key {
        Key::Enter if modifiers.ctrl || modifiers.meta => Some(ExamCommand::Submit),
        _ if modifiers.any() => None,
        Key::ArrowLeft => Some(ExamCommand::Previous),
        Key::ArrowRight => Some(ExamCommand::Next),
        Key::Space => Some(ExamCommand::Pause),
        Key::Char(c @ '1'..='4') => Some(ExamCommand::SelectOption(c as usize - '1' as usize)),
        Key::Char(c) if ('a'..='d').contains(&c.to_ascii_lowercase()) => Some(
            ExamCommand::SelectOption(c.to_ascii_lowercase() as usize - 'a' as usize),
        ),
        Key::Char('f' | 'F') => Some(ExamCommand::ToggleReview),
        Key::Enter | Key::Char(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_and_letters_pick_options() {
        assert_eq!(
            command_for(Key::Char('1'), Modifiers::none()),
            Some(ExamCommand::SelectOption(0))
        );
        assert_eq!(
            command_for(Key::Char('4'), Modifiers::none()),
            Some(ExamCommand::SelectOption(3))
        );
        assert_eq!(
            command_for(Key::Char('C'), Modifiers::none()),
            Some(ExamCommand::SelectOption(2))
        );
        assert_eq!(command_for(Key::Char('5'), Modifiers::none()), None);
    }

    #[test]
    fn arrows_flag_and_pause() {
        assert_eq!(
            command_for(Key::ArrowLeft, Modifiers::none()),
            Some(ExamCommand::Previous)
        );
        assert_eq!(
            command_for(Key::ArrowRight, Modifiers::none()),
            Some(ExamCommand::Next)
        );
        assert_eq!(
            command_for(Key::Char('F'), Modifiers::none()),
            Some(ExamCommand::ToggleReview)
        );
        assert_eq!(command_for(Key::Space, Modifiers::none()), Some(ExamCommand::Pause));
    }

    #[test]
    fn submit_needs_ctrl_enter() {
        assert_eq!(command_for(Key::Enter, Modifiers::none()), None);
        assert_eq!(command_for(Key::Enter, Modifiers::ctrl()), Some(ExamCommand::Submit));
        assert_eq!(command_for(Key::Char('a'), Modifiers::ctrl()), None);
    }
}
