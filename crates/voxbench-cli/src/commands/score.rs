use voxbench_core::WerScorer;

use super::text_or_file;

pub fn run(reference: &str, hypothesis: &str, json: bool) {
    let reference = text_or_file(reference);
    let hypothesis = text_or_file(hypothesis);

    let report = WerScorer::default().score(&reference, &hypothesis);

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if report.wer.is_nan() {
        println!("WER: undefined (empty reference)");
    } else {
        println!("WER: {:.4}", report.wer);
    }
    println!(
        "  {} hit(s), {} substitution(s), {} deletion(s), {} insertion(s)",
        report.num_hits, report.num_substitutions, report.num_deletions, report.num_insertions
    );
    let rendered: Vec<String> = report
        .diff
        .iter()
        .map(|entry| match entry.tag {
            voxbench_core::EditTag::None => entry.token.clone(),
            _ => format!("[{}:{:?}]", entry.token, entry.tag),
        })
        .collect();
    println!("  diff: {}", rendered.join(" "));
}
