//! Keyword routing for messages that arrive without a lane.

use dispatch_core::Lane;

const KEYWORDS: [(Lane, &[&str]); 6] = [
    (
        Lane::Jobs,
        &[
            "job", "apply", "application", "interview", "resume", "cover letter", "linkedin", "salary", "role",
            "hiring", "recruiter", "follow up",
        ],
    ),
    (
        Lane::Build,
        &[
            "project", "app", "game", "code", "build", "makerspace", "cnc", "3d print", "deploy", "ship",
            "feature", "bug", "repo",
        ],
    ),
    (
        Lane::Learn,
        &["course", "coursera", "study", "learn", "skill", "certification", "read", "tutorial", "practice"],
    ),
    (
        Lane::Home,
        &[
            "house", "home", "repair", "maintenance", "farm", "fix", "broken", "hvac", "plumbing", "electrical",
            "vendor", "contractor",
        ],
    ),
    (
        Lane::Write,
        &["write", "writing", "draft", "article", "post", "essay", "publish", "blog", "content"],
    ),
    (
        Lane::SelfCare,
        &[
            "sleep", "health", "exercise", "motivation", "feeling", "tired", "anxious", "depression", "adhd",
            "habit", "energy",
        ],
    ),
];

/// The lane with the most keyword hits. Ties and no hits go to `dispatch`.
pub fn detect_lane(text: &str) -> Lane {
    let text = text.to_lowercase();
    let mut best = (Lane::Dispatch, 0usize);
    let mut tied = false;
    for (lane, words) in KEYWORDS {
        let hits = words.iter().filter(|w| text.contains(*w)).count();
        if hits > best.1 {
            best = (lane, hits);
            tied = false;
        } else if hits > 0 && hits == best.1 {
            tied = true;
        }
    }
    if tied { Lane::Dispatch } else { best.0 }
}
