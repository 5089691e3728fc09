use rand::Rng;

use crate::domain::models::{Exam, ExamInstance};

/// Builds the per-attempt instance of an exam template.
///
/// Every mcq question gets an independently Fisher-Yates-shuffled copy of
/// its options; the correct answer is a value, not an index, so the answer
/// key survives any permutation. Non-mcq questions pass through unchanged
/// and the template itself is never mutated.
pub(crate) fn build_instance<R: Rng + ?Sized>(template: &Exam, rng: &mut R) -> ExamInstance {
    let mut exam = template.clone();

    for question in &mut exam.questions {
        if question.is_mcq() {
            shuffle(&mut question.options, rng);
        }
    }

    ExamInstance { exam }
}

fn shuffle<R: Rng + ?Sized>(options: &mut [String], rng: &mut R) {
    for i in (1..options.len()).rev() {
        let j = rng.gen_range(0..=i);
        options.swap(i, j);
    }
}
