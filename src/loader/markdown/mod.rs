
use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use super::SectionMark;

/// Record a heading path for every markdown heading, keyed by character offset
#[inline]
pub fn section_marks(text: &str) -> Vec<SectionMark> {
    let mut marks = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut current: Option<(usize, usize, String)> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level as usize, range.start, String::new()));
            }
            Event::Text(fragment) | Event::Code(fragment) => {
                if let Some((_, _, title)) = current.as_mut() {
                    title.push_str(&fragment);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                let Some((level, start, title)) = current.take() else {
                    continue;
                };
                let title = title.trim().to_string();
                if title.is_empty() {
                    continue;
                }

                while stack.last().is_some_and(|(l, _)| *l >= level) {
                    stack.pop();
                }
                stack.push((level, title));

                marks.push(SectionMark {
                    offset: char_offset(text, start),
                    path: stack
                        .iter()
                        .map(|(_, t)| t.as_str())
                        .collect::<Vec<_>>()
                        .join(" > "),
                });
            }
            _ => {}
        }
    }

    marks
}

fn char_offset(text: &str, byte_offset: usize) -> usize {
    text.char_indices()
        .take_while(|(i, _)| *i < byte_offset)
        .count()
}
