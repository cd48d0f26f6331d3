// src/engine/analytics.rs

use crate::{
    engine::scoring::percentage,
    models::{
        attempt::Attempt,
        quiz::Quiz,
        score::{QuestionStat, Summary},
    },
};

/// Summarizes the graded attempts of one quiz. Unset scores and durations
/// count as zero; an empty slice gives an all-zero summary.
pub fn summarize(attempts: &[Attempt]) -> Summary {
    if attempts.is_empty() {
        return Summary::default();
    }

    let count = attempts.len();
    let mut scores: Vec<u32> = attempts.iter().map(|a| a.score.unwrap_or(0)).collect();
    scores.sort_unstable();

    let total_score: u64 = scores.iter().map(|&s| u64::from(s)).sum();
    let total_time: u64 = attempts
        .iter()
        .map(|a| u64::from(a.time_taken_seconds.unwrap_or(0)))
        .sum();
    let passed = attempts.iter().filter(|a| a.passed == Some(true)).count();

    Summary {
        total_attempts: count,
        average_score: rounded_mean(total_score, count),
        median_score: median(&scores),
        pass_rate: percentage(passed as u32, count as u32),
        average_time: rounded_mean(total_time, count),
    }
}

/// Per-question correctness across the graded attempts, in quiz order.
///
/// Stats are looked up by question id, so questions sharing an id report
/// the same numbers.
pub fn question_stats(quiz: &Quiz, attempts: &[Attempt]) -> Vec<QuestionStat> {
    quiz.questions
        .iter()
        .map(|question| {
            let graded = attempts
                .iter()
                .filter_map(|a| a.answers.get(&question.id))
                .filter_map(|recorded| recorded.is_correct);

            let (answered, correct) = graded.fold((0, 0), |(answered, correct), is_correct| {
                (answered + 1, correct + usize::from(is_correct))
            });

            QuestionStat {
                question_id: question.id.clone(),
                answered,
                correct,
                correct_rate: percentage(correct as u32, answered as u32),
            }
        })
        .collect()
}

fn rounded_mean(total: u64, count: usize) -> u32 {
    (total as f64 / count as f64).round() as u32
}

/// Median of an already sorted, non-empty slice.
fn median(sorted: &[u32]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
    } else {
        f64::from(sorted[mid])
    }
}
