//! Card template (note type HTML and CSS)

use std::fs;
use std::path::Path;

use crate::error::DeckError;

pub const MODEL_NAME: &str = "Chess Blunder Model";
pub const TEMPLATE_NAME: &str = "Chess Blunder Card";

const FRONT: &str = r#"<h1>{{Title}}</h1>
<h2>{{Mover}} to play, move {{MoveNumber}} ({{EvalBefore}})</h2>

<div class="board">
<iframe id="board" src="https://lichess.org/analysis" allowtransparency="true" frameborder="0" scrolling="no"></iframe>
</div>

<script>
var variant = /960/.test("{{Variant}}") ? "chess960" : "standard";
document.getElementById("board").src =
    "https://lichess.org/analysis/" + variant + "/" + "{{FEN}}".replace(/ /g, "_");
</script>"#;

const BACK: &str = r#"<h1>{{Title}}</h1>
<h2>Best: {{Moves}}</h2>
<h3>Played {{Played}} ({{EvalBefore}} &rarr; {{EvalAfter}})</h3>
<h3>Engine choices: {{Alternatives}}</h3>
<h3>Game continuation: {{PGNContinuation}}</h3>

<div class="board">
<iframe id="board" src="https://lichess.org/analysis" allowtransparency="true" frameborder="0" scrolling="no"></iframe>
</div>

<script>
var variant = /960/.test("{{Variant}}") ? "chess960" : "standard";
document.getElementById("board").src =
    "https://lichess.org/analysis/" + variant + "/" + "{{FEN}}".replace(/ /g, "_");
</script>"#;

const CSS: &str = r#".card {
    margin: 0px;
    font-size: 32px;
    text-align: center;
    color: black;
}
.board iframe {
    width: 100%;
    max-width: 600px;
    height: 725px;
}
h1 {
    font-size: 14px;
}
h2 {
    font-size: 12px;
}
h3 {
    font-size: 10px;
}"#;

/// Front/back HTML plus styling of the single card type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTemplate {
    pub front: String,
    pub back: String,
    pub css: String,
}

impl Default for CardTemplate {
    fn default() -> Self {
        Self {
            front: FRONT.to_string(),
            back: BACK.to_string(),
            css: CSS.to_string(),
        }
    }
}

impl CardTemplate {
    /// Load `front.html`, `back.html` and `style.css` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, DeckError> {
        let read = |name: &str| {
            let path = dir.join(name);
            fs::read_to_string(&path).map_err(|e| {
                DeckError::Config(format!("Cannot read template {}: {e}", path.display()))
            })
        };

        Ok(Self {
            front: read("front.html")?,
            back: read("back.html")?,
            css: read("style.css")?,
        })
    }
}
