// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

/// System prompt of the summarization agent unless one is configured.
pub const DEFAULT_SUMMARIZATION_PROMPT: &str = "\
You are a conversation summarizer. Produce a concise summary of the \
conversation history you are given. The summary replaces that history, so \
it must carry everything needed to continue the conversation.

Format the summary as bullet points written in the third person, without \
headings or preamble. Preserve:
- the user's goals, requirements and stated preferences
- decisions made and the reasons given for them
- every tool that was called, with its key arguments and results
- file names, identifiers, numbers and error messages verbatim
- open questions and unfinished work";

/// Instruction appended after the messages being summarized.
pub const SUMMARY_REQUEST: &str = "Please summarize this conversation.";
