use thiserror::Error;

/// Inbound text is matched after trimming and case-folding, mirroring what
/// the messaging gateway delivers.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

/// Fixed two-token vocabulary. Anything else re-prompts at the calling step.
pub fn parse_answer(msg: &str) -> Option<Answer> {
    match msg {
        "yes" => Some(Answer::Yes),
        "no" => Some(Answer::No),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is not a whole number")]
    NotANumber,
    #[error("quantity must be greater than zero")]
    NotPositive,
}

/// Accepts only inputs that resolve to a positive integer. Zero, negatives,
/// decimals, and non-numeric text are all rejected.
pub fn parse_quantity(msg: &str) -> Result<u32, QuantityError> {
    let value: i64 = msg.parse().map_err(|_| QuantityError::NotANumber)?;
    if value <= 0 {
        return Err(QuantityError::NotPositive);
    }
    u32::try_from(value).map_err(|_| QuantityError::NotANumber)
}

/// 1-based pick from a numbered menu of `upper` entries.
pub fn parse_menu_choice(msg: &str, upper: usize) -> Option<usize> {
    let choice: usize = msg.parse().ok()?;
    (1..=upper).contains(&choice).then_some(choice)
}
