use rand::seq::SliceRandom;
use rand::Rng;

use super::tally::DetectionTally;

/// Utterance id for a sentence describing detected objects.
pub const OBJECT_DETECTED: &str = "object_detected";
/// Utterance id for the "nothing here" sentence.
pub const NOTHING_DETECTED: &str = "nothing_detected";

const NOTHING_SENTENCES: [&str; 4] = [
    "There\u{2019}s currently nothing detected in front of you.",
    "I\u{2019}m not seeing any recognizable objects at the moment.",
    "It looks clear, with no objects in your view.",
    "Nothing appears to be directly ahead of you.",
];

/// A composed narration line and the utterance id it is spoken under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    pub utterance_id: &'static str,
}

fn describe(name: &str, count: usize, rng: &mut impl Rng) -> String {
    let pick = rng.gen_range(0..4);
    match count {
        1 => match pick {
            0 => format!("There's a single {} in front of you.", name),
            1 => format!("I can see one {} nearby.", name),
            2 => format!("A {} is directly ahead.", name),
            _ => format!("You have a {} right in front of you.", name),
        },
        2..=4 => match pick {
            0 => format!("I see {} {}s nearby.", count, name),
            1 => format!("There are a few {}s in your vicinity.", name),
            2 => format!("You\u{2019}re looking at {} {}s.", count, name),
            _ => format!("I\u{2019}ve detected {} {}s ahead.", count, name),
        },
        _ => match pick {
            0 => format!("There are several {}s around you.", name),
            1 => format!("I can spot many {}s in your view.", name),
            2 => format!("You have a group of {}s nearby.", name),
            _ => format!("There seems to be a crowd of {}s in front of you.", name),
        },
    }
}

/// Build the narration for a tally. One sentence per label, joined by spaces.
pub fn compose_sentence(tally: &DetectionTally, rng: &mut impl Rng) -> Sentence {
    if tally.is_empty() {
        let text = NOTHING_SENTENCES
            .choose(rng)
            .copied()
            .unwrap_or(NOTHING_SENTENCES[0]);
        return Sentence {
            text: text.to_string(),
            utterance_id: NOTHING_DETECTED,
        };
    }

    let parts: Vec<String> = tally
        .iter()
        .map(|(name, count)| describe(name, count, rng))
        .collect();
    Sentence {
        text: parts.join(" "),
        utterance_id: OBJECT_DETECTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tally(entries: &[(&str, usize)]) -> DetectionTally {
        let mut tally = DetectionTally::new();
        for (label, count) in entries {
            for _ in 0..*count {
                tally.add(label);
            }
        }
        tally
    }

    #[test]
    fn empty_tally_uses_nothing_sentences() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let sentence = compose_sentence(&DetectionTally::new(), &mut rng);
            assert_eq!(sentence.utterance_id, NOTHING_DETECTED);
            assert!(NOTHING_SENTENCES.contains(&sentence.text.as_str()));
        }
    }

    #[test]
    fn count_bands_pick_matching_templates() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let one = compose_sentence(&tally(&[("cat", 1)]), &mut rng).text;
            assert!(one.contains("cat") && !one.contains("cats"), "{}", one);

            let few = compose_sentence(&tally(&[("dog", 3)]), &mut rng).text;
            assert!(few.contains("dogs"), "{}", few);
            assert!(few.contains('3') || few.contains("a few"), "{}", few);

            let many = compose_sentence(&tally(&[("bird", 5)]), &mut rng).text;
            assert!(many.contains("birds"), "{}", many);
            assert!(!many.contains('5'), "{}", many);
        }
    }

    #[test]
    fn one_sentence_per_label_in_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let sentence = compose_sentence(&tally(&[("cat", 1), ("person", 2)]), &mut rng);
        assert_eq!(sentence.utterance_id, OBJECT_DETECTED);
        let cat = sentence.text.find("cat").unwrap();
        let person = sentence.text.find("persons").unwrap();
        assert!(cat < person);
        assert_eq!(sentence.text.matches('.').count(), 2);
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let t = tally(&[("car", 2), ("bus", 6)]);
        let a = compose_sentence(&t, &mut StdRng::seed_from_u64(9));
        let b = compose_sentence(&t, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
