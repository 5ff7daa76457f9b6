use super::{DayExport, STICKERS};
use crate::location::Location;
use crate::model::MediaRef;
use maud::{html, Markup, PreEscaped, DOCTYPE};

/// Standalone page for one day, with all styling inlined.
pub fn render_day(day: &DayExport<'_>) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Journal Entry - " (day.date_string) }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.journal-page {
                    div.journal-header {
                        h1.journal-date { (day.date_string) }
                        @if let Some(location) = &day.location {
                            (location_info(location))
                        }
                    }
                    @if let Some(verse) = day.verse {
                        div.verse-section {
                            div.verse-decoration { "✨" }
                            blockquote.daily-verse {
                                p { (verse.text) }
                                footer { (verse.reference) }
                            }
                        }
                    }
                    @if !day.photos.is_empty() {
                        div.photobooth-container {
                            (photobooth_strip(day.strip_photos()))
                        }
                    }
                    div.notes-section {
                        @for note in &day.notes {
                            div.journal-note {
                                div.note-content { (note) }
                            }
                        }
                    }
                    @if !day.audio.is_empty() {
                        div.audio-section {
                            h3.section-title { "🎵 Audio Memories" }
                            @for (i, clip) in day.audio.iter().enumerate() {
                                div.audio-player {
                                    audio controls {
                                        source src=(clip.data_uri) type=(clip.mime);
                                    }
                                    span.audio-label { "Recording " (i + 1) }
                                }
                            }
                        }
                    }
                    @if let Some(location) = &day.location {
                        div.map-section {
                            (map_card(location))
                        }
                    }
                    div.journal-footer {
                        div.sticker-row {
                            @for sticker in STICKERS {
                                span.sticker { (sticker) }
                            }
                        }
                        p.export-info { "Exported with ❤️ from Daybook" }
                    }
                }
            }
        }
    }
}

fn location_info(location: &Location) -> Markup {
    html! {
        div.location-info {
            span.location-icon { "📍" }
            span.location-name { (location.label().unwrap_or_default()) }
            span.coordinates {
                (format!("{:.4}, {:.4}", location.coords.lat, location.coords.lng))
            }
        }
    }
}

fn photobooth_strip(photos: &[&MediaRef]) -> Markup {
    html! {
        div.photobooth-strip {
            div.strip-holes.top {}
            @for (i, photo) in photos.iter().enumerate() {
                div.photo-frame {
                    img src=(photo.data_uri) alt={ "Photo " (i + 1) };
                }
            }
            div.strip-holes.bottom {}
        }
    }
}

fn map_card(location: &Location) -> Markup {
    html! {
        div.map-container {
            div.map-wrapper {
                (PreEscaped(MAP_SVG))
                div.map-location-info {
                    @if let Some(city) = &location.place.city {
                        div.map-city { (city) }
                    }
                    div.map-coords {
                        (format!("{:.6}, {:.6}", location.coords.lat, location.coords.lng))
                    }
                }
            }
        }
    }
}

const MAP_SVG: &str = r##"<svg class="simple-map" viewBox="0 0 400 250" xmlns="http://www.w3.org/2000/svg">
<defs>
<linearGradient id="skyGradient" x1="0%" y1="0%" x2="0%" y2="100%"><stop offset="0%" stop-color="#87CEEB"/><stop offset="100%" stop-color="#E0F6FF"/></linearGradient>
<linearGradient id="waterGradient" x1="0%" y1="0%" x2="0%" y2="100%"><stop offset="0%" stop-color="#4A90E2" stop-opacity="0.6"/><stop offset="100%" stop-color="#6BB6FF" stop-opacity="0.3"/></linearGradient>
<pattern id="grid" width="20" height="20" patternUnits="userSpaceOnUse"><path d="M 20 0 L 0 0 0 20" fill="none" stroke="#FFFFFF" stroke-width="0.5" opacity="0.3"/></pattern>
</defs>
<rect width="400" height="250" fill="url(#skyGradient)"/>
<circle cx="200" cy="125" r="100" fill="url(#waterGradient)"/>
<circle cx="200" cy="125" r="70" fill="#6BB6FF" opacity="0.4"/>
<circle cx="200" cy="125" r="40" fill="#4A90E2" opacity="0.5"/>
<rect width="400" height="250" fill="url(#grid)"/>
<g transform="translate(200, 125)">
<ellipse cx="0" cy="35" rx="15" ry="5" fill="#000000" opacity="0.3"/>
<path d="M0 -30 C-17 -30 -30 -17 -30 0 C-30 25 0 45 0 45 S30 25 30 0 C30 -17 17 -30 0 -30Z" fill="#FF4444" stroke="#CC0000" stroke-width="2"/>
<circle r="10" fill="#FFFFFF"/><circle r="6" fill="#FF4444"/>
</g>
<g opacity="0.7">
<ellipse cx="80" cy="40" rx="25" ry="12" fill="white"/><ellipse cx="100" cy="42" rx="20" ry="10" fill="white"/>
<ellipse cx="320" cy="60" rx="30" ry="14" fill="white"/><ellipse cx="340" cy="62" rx="20" ry="10" fill="white"/>
</g>
</svg>"##;

const CSS: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }

body {
    font-family: 'Indie Flower', 'Comic Sans MS', cursive;
    background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
    min-height: 100vh;
    padding: 20px;
}

.journal-page {
    max-width: 800px;
    margin: 0 auto;
    background: #FFF9E6;
    border-radius: 10px;
    box-shadow: 0 20px 60px rgba(0,0,0,0.3);
    padding: 30px;
    position: relative;
}

.journal-header {
    text-align: center;
    margin-bottom: 30px;
    padding-bottom: 20px;
    border-bottom: 2px dashed #FFB3B3;
}

.journal-date { font-size: 2.5em; color: #764ba2; font-weight: 700; margin-bottom: 10px; }

.location-info {
    display: flex;
    flex-direction: column;
    align-items: center;
    gap: 4px;
    color: #666;
    font-size: 0.9em;
}

.location-name { font-weight: 600; color: #764ba2; font-size: 1.1em; }
.coordinates { font-family: monospace; font-size: 0.8em; opacity: 0.7; }

.verse-section {
    background: linear-gradient(135deg, #ffecd2 0%, #fcb69f 100%);
    border-radius: 15px;
    padding: 20px;
    margin: 20px 0;
    position: relative;
}

.verse-decoration { position: absolute; top: -10px; right: 20px; font-size: 2em; }

.daily-verse {
    font-style: italic;
    color: #5a4a42;
    border-left: 4px solid #ff9a9e;
    padding-left: 20px;
}

.daily-verse footer { text-align: right; margin-top: 10px; font-size: 0.9em; opacity: 0.8; }

.photobooth-container { display: flex; justify-content: center; margin: 30px 0; }

.photobooth-strip {
    background: #222;
    padding: 10px 5px;
    border-radius: 5px;
    box-shadow: 0 10px 30px rgba(0,0,0,0.3);
}

.strip-holes {
    height: 20px;
    background: repeating-linear-gradient(90deg, transparent 0, transparent 10px, #fff 10px, #fff 20px);
    opacity: 0.3;
}

.strip-holes.top { margin-bottom: 5px; }
.strip-holes.bottom { margin-top: 5px; }

.photo-frame { width: 180px; height: 180px; background: #fff; margin: 5px; padding: 5px; border-radius: 3px; }
.photo-frame img { width: 100%; height: 100%; object-fit: cover; border-radius: 2px; }

.notes-section { margin: 30px 0; }

.journal-note {
    background: rgba(255, 255, 255, 0.5);
    border-radius: 10px;
    padding: 15px;
    margin: 10px 0;
    line-height: 1.8;
    color: #444;
    font-size: 1.1em;
    border: 1px solid rgba(255, 179, 179, 0.3);
    white-space: pre-wrap;
}

.audio-section { margin: 30px 0; }
.section-title { color: #764ba2; font-size: 1.5em; margin-bottom: 15px; }

.audio-player {
    display: flex;
    align-items: center;
    gap: 15px;
    margin: 10px 0;
    padding: 10px;
    background: rgba(255, 255, 255, 0.5);
    border-radius: 10px;
}

.audio-label { font-size: 0.9em; color: #666; }

.map-container { margin: 30px 0; text-align: center; }

.map-wrapper {
    position: relative;
    display: inline-block;
    border-radius: 15px;
    overflow: hidden;
    box-shadow: 0 10px 30px rgba(0,0,0,0.2);
}

.simple-map { width: 100%; max-width: 400px; height: auto; display: block; }

.map-location-info {
    position: absolute;
    bottom: 0;
    left: 0;
    right: 0;
    background: linear-gradient(to top, rgba(0,0,0,0.8) 0%, transparent 100%);
    color: white;
    padding: 20px 10px 10px;
}

.map-city { font-size: 1.2em; font-weight: 600; margin-bottom: 5px; }
.map-coords { font-size: 0.8em; font-family: monospace; }

.journal-footer { margin-top: 40px; padding-top: 20px; border-top: 2px dashed #FFB3B3; text-align: center; }
.sticker-row { font-size: 2em; margin: 10px 0; display: flex; justify-content: center; gap: 15px; }
.export-info { margin-top: 20px; font-size: 0.9em; color: #999; }

@media (prefers-color-scheme: dark) {
    body { background: linear-gradient(135deg, #1e3c72 0%, #2a5298 100%); }
    .journal-page { background: #2a2a2a; color: #e0e0e0; }
    .journal-date { color: #BB86FC; }
    .daily-verse { color: #e0e0e0; border-left-color: #BB86FC; }
    .journal-note { background: rgba(60, 60, 60, 0.5); color: #e0e0e0; }
}

@media print {
    body { background: white; padding: 0; }
    .journal-page { box-shadow: none; padding: 20px; }
}
"#;

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::model::ContentItem;

    fn render(items: &[ContentItem], with_location: bool) -> String {
        let refs: Vec<&ContentItem> = items.iter().collect();
        let location = with_location.then(location);
        render_day(&DayExport::new(day(), &refs, location)).into_string()
    }

    #[test]
    fn no_photos_means_no_strip() {
        let page = render(&[note("quiet day"), verse()], false);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(!page.contains("class=\"photobooth-strip\""));
        assert!(page.contains("quiet day"));
        assert!(page.contains("1 Corinthians 13:4"));
    }

    #[test]
    fn strip_holds_at_most_four_photos() {
        let items: Vec<ContentItem> = (0..5).map(photo).collect();
        let page = render(&items, false);
        assert_eq!(page.matches("class=\"photo-frame\"").count(), 4);
        assert!(!page.contains("UE5H4"));
    }

    #[test]
    fn strip_appears_with_one_photo() {
        let page = render(&[photo(1)], false);
        assert!(page.contains("class=\"photobooth-strip\""));
    }

    #[test]
    fn audio_sources_keep_their_mime_type() {
        let page = render(&[audio("audio/mpeg")], false);
        assert!(page.contains("type=\"audio/mpeg\""));
        assert!(!page.contains("audio/webm\""));
    }

    #[test]
    fn note_text_is_escaped() {
        let page = render(&[note("<script>alert(1)</script>")], false);
        assert!(!page.contains("<script>alert"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn location_shows_place_and_coordinates() {
        let page = render(&[note("x")], true);
        assert!(page.contains("Bangkok, Thailand"));
        assert!(page.contains("13.7563, 100.5018"));
        assert!(page.contains("13.756331, 100.501765"));
        assert!(page.contains("class=\"simple-map\""));
        let without = render(&[note("x")], false);
        assert!(!without.contains("class=\"simple-map\""));
    }

    #[test]
    fn footer_has_stickers() {
        let page = render(&[], false);
        for sticker in STICKERS {
            assert!(page.contains(sticker));
        }
        assert!(page.contains("Exported with"));
    }
}
