use chrono::NaiveDate;

use crate::models::options::{ColorMode, Layout, PromptOptions, Style};

/// Build the instruction sent to the image model.
///
/// The result is deterministic for a given set of options and date stamp:
/// - frame size and `"<layout> grid"` wording come from the layout
/// - colour mode and style each add one sentence
/// - the duo clause is only added for two-person uploads
/// - the logo, date and QR placement text is always present
pub fn build_prompt(options: &PromptOptions, date: NaiveDate) -> String {
    let layout = options.layout;
    let (width, height) = layout.frame_size();
    let cells = layout.cell_count();

    let mut lines = vec![
        format!(
            "Create a photo strip as a {layout} grid. Full frame size {width}x{height} pixels."
        ),
        format!(
            "{cells} images {}. Each image has 4:3 aspect ratio with different natural poses and expressions.",
            layout.arrangement()
        ),
        format!(
            "All {} frame. No text on top of frame. Top margin should be narrow, similar to side margins, with images positioned accordingly.",
            options.frame_color.describe()
        ),
    ];

    if options.is_duo {
        lines.push(duo_clause().to_string());
    }

    lines.push(color_mode_clause(options.color_mode).to_string());
    if let Some(style) = style_clause(options.style) {
        lines.push(style.to_string());
    }

    lines.push(format!(
        "At the bottom of the frame, add the logo from the {} reference image and '{}' in vertical center alignment.",
        ordinal(logo_position(options.is_duo)),
        date.format("%Y.%m.%d")
    ));
    lines.push("Date should be 10% of logo size, small.".to_string());
    lines.push(
        "The QR code from the last reference image should be inserted small and naturally at the bottom right corner of the frame (to the right of the date), half the size of the logo, as small as possible while maintaining QR functionality."
            .to_string(),
    );

    lines.join("\n")
}

/// 1-based position of the logo among the reference images: it follows the user photo(s).
pub fn logo_position(is_duo: bool) -> usize {
    if is_duo {
        3
    } else {
        2
    }
}

fn ordinal(position: usize) -> &'static str {
    match position {
        1 => "first",
        2 => "second",
        3 => "third",
        _ => "next",
    }
}

/// Clause added when two people are supplied in separate photos.
pub fn duo_clause() -> &'static str {
    "Two people appear together in every image: the person from the first photo and the person from the second photo, posing side by side naturally as a pair."
}

fn color_mode_clause(mode: ColorMode) -> &'static str {
    match mode {
        ColorMode::Color => "Keep natural, true-to-life colors.",
        ColorMode::Bw => "Render every image in black and white with rich contrast.",
        ColorMode::Cool => "Apply a cool color grade with soft blue tones.",
        ColorMode::Warm => "Apply a warm color grade with soft golden tones.",
    }
}

fn style_clause(style: Style) -> Option<&'static str> {
    match style {
        Style::Default => None,
        Style::Vintage => Some("Give the photos a vintage look with faded tones and light grain."),
        Style::Film => Some("Make the photos look like analog film snapshots with subtle grain."),
        Style::Cartoon => Some("Redraw the people in a clean cartoon illustration style."),
        Style::Watercolor => Some("Paint the photos in a soft watercolor style."),
    }
}

/// Layout wording as it appears in the prompt, e.g. `"2x2 grid"`.
pub fn layout_marker(layout: Layout) -> String {
    format!("{layout} grid")
}
