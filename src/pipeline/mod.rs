pub mod submission; // Submission & Confirmation Pipeline
