//! Tests for the prompt templates shipped in config/prompts

use std::fs;
use std::path::PathBuf;

use haigui::prompt::{Prompts, Template};

fn prompts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/prompts")
}

#[test]
fn test_every_prompt_file_exists() {
    for t in Template::ALL {
        let path = prompts_dir().join(t.file_name());
        assert!(fs::metadata(&path).is_ok(), "{} prompt file missing", t.file_name());
    }
}

#[test]
fn test_prompt_files_declare_their_vars() {
    for t in Template::ALL {
        let text = fs::read_to_string(prompts_dir().join(t.file_name())).unwrap();
        for var in t.vars() {
            let placeholder = format!("{{{{{var}}}}}");
            assert!(text.contains(&placeholder), "{} should contain {placeholder}", t.file_name());
        }
    }
}

#[test]
fn test_host_prompts_demand_braced_replies() {
    let prompts = Prompts::new(prompts_dir());
    let answer = prompts.text(Template::HostAnswer);
    for reply in ["{是}", "{不是}", "{是也不是}", "{没有关系}"] {
        assert!(answer.contains(reply), "host_answer.txt should mention {reply}");
    }
    let check = prompts.text(Template::GameCheck);
    for reply in ["{完全正确}", "{部分正确}", "{完全错误}"] {
        assert!(check.contains(reply), "game_check.txt should mention {reply}");
    }
}

#[test]
fn test_rendered_prompt_has_no_leftover_placeholders() {
    let prompts = Prompts::new(prompts_dir());
    let text = prompts.render(
        Template::ExplanationProbs,
        [("begin", "He opened the door."), ("end", "He died."), ("options", "1. a\n2. b")],
    );
    assert!(!text.contains("{{"), "unrendered placeholder in: {text}");
    assert!(text.contains("End: He died."));
}
