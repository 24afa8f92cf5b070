//! # Folio CLI
//!
//! Usage:
//!   folio input.json -o layout.json
//!   echo '{ ... }' | folio
//!   folio header.json --header-footer 468 72
//!   folio header.json --header-footer 468 72 72
//!   folio --example > sample.json
//!
//! Set `RUST_LOG=folio=debug` to trace page and section decisions.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use folio::model::HeaderFooterConstraints;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_document_json());
        return;
    }

    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1]).unwrap_or_else(|e| fail(&format!("Failed to read {}: {}", args[1], e)))
    } else {
        let mut buf = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut buf) {
            fail(&format!("Failed to read stdin: {}", e));
        }
        buf
    };

    let output_path = args
        .windows(2)
        .find(|w| w[0] == "-o")
        .map(|w| w[1].clone());

    let header_footer = header_footer_args(&args).map(|parsed| parsed.unwrap_or_else(|e| fail(&e)));

    let rendered = match header_footer {
        Some(constraints) => folio::layout_header_footer_json(&input, &constraints)
            .and_then(|layout| folio::to_json(&layout)),
        None => folio::layout_json(&input).and_then(|layout| folio::to_json(&layout)),
    };

    let json = match rendered {
        Ok(json) => json,
        Err(e) => fail(&format!("Layout failed: {}", e)),
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                fail(&format!("Failed to write {}: {}", path, e));
            }
            eprintln!("✓ Written {} bytes to {}", json.len(), path);
        }
        None => println!("{}", json),
    }
}

/// `--header-footer W H [LEFT]`. LEFT is the page's left margin, used to
/// rebase page-relative anchors into the header box.
fn header_footer_args(args: &[String]) -> Option<Result<HeaderFooterConstraints, String>> {
    let at = args.iter().position(|a| a == "--header-footer")?;
    let number = |offset: usize, name: &str| -> Result<f64, String> {
        args.get(at + offset)
            .and_then(|a| a.parse::<f64>().ok())
            .ok_or_else(|| format!("--header-footer {} must be a number", name))
    };

    let parsed = number(1, "width").and_then(|width| {
        Ok(HeaderFooterConstraints {
            width,
            height: number(2, "height")?,
            margin_left: number(3, "left margin").unwrap_or(0.0),
        })
    });
    Some(parsed)
}

fn fail(message: &str) -> ! {
    eprintln!("✗ {}", message);
    process::exit(1);
}

fn example_document_json() -> &'static str {
    r##"{
  "blocks": [
    {
      "kind": "sectionBreak",
      "id": "s0",
      "sectionIndex": 0,
      "pageSize": { "width": 612, "height": 792 },
      "margins": { "top": 72, "right": 72, "bottom": 72, "left": 72, "header": 36, "footer": 36 }
    },
    {
      "kind": "paragraph",
      "id": "title",
      "runs": [{ "text": "Quarterly Report" }],
      "attrs": { "keepNext": true, "spacing": { "after": 12 }, "styleId": "Title" }
    },
    {
      "kind": "paragraph",
      "id": "intro",
      "runs": [{ "text": "Revenue grew in every region this quarter." }],
      "attrs": { "spacing": { "after": 8 } }
    },
    {
      "kind": "table",
      "id": "figures",
      "attrs": { "justification": "center", "repeatHeaderRows": 1 }
    },
    {
      "kind": "sectionBreak",
      "id": "s1",
      "sectionIndex": 1,
      "breakType": "continuous",
      "columns": { "count": 2, "gap": 36 }
    },
    {
      "kind": "paragraph",
      "id": "notes",
      "runs": [{ "text": "Notes flow in two balanced columns." }]
    }
  ],
  "measures": [
    { "kind": "sectionBreak" },
    { "kind": "paragraph", "lines": [{ "height": 28, "width": 220 }], "totalHeight": 28 },
    {
      "kind": "paragraph",
      "lines": [{ "height": 14, "width": 468 }, { "height": 14, "width": 300 }],
      "totalHeight": 28
    },
    {
      "kind": "table",
      "width": 400,
      "height": 60,
      "rows": [{ "height": 20 }, { "height": 20 }, { "height": 20 }]
    },
    { "kind": "sectionBreak" },
    {
      "kind": "paragraph",
      "lines": [
        { "height": 14, "width": 216 },
        { "height": 14, "width": 216 },
        { "height": 14, "width": 216 },
        { "height": 14, "width": 120 }
      ],
      "totalHeight": 56
    }
  ],
  "options": {
    "pageSize": { "width": 612, "height": 792 },
    "margins": { "top": 72, "right": 72, "bottom": 72, "left": 72, "header": 36, "footer": 36 },
    "headerContentHeights": { "default": 24 }
  }
}
"##
}
