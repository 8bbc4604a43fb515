//! Chain disassembler
//!
//! Provides two output formats for inspecting compiled chains:
//! - Compact: one kind name per line, identical to `ChainView::dump`
//! - Verbose: ids, payloads and successors, with a section per subroutine
//!
//! ## Example
//!
//! ```ignore
//! use shapecode_compiler::{Disassembler, DisassemblyFormat};
//!
//! let disasm = Disassembler::with_format(DisassemblyFormat::Verbose)
//!     .show_shapes(true);
//! println!("{}", disasm.disassemble(&chain));
//! ```

use shapecode_bytecode::core::{Chain, ChainView};
use shapecode_bytecode::types::OpId;
use std::fmt::Write as _;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisassemblyFormat {
    /// Compact format: "SLICE_HEAD"
    Compact,

    /// Verbose format with ids and payloads
    /// "0001: SLICE_HEAD elem=#3 end=#4 -> #2"
    Verbose,
}

#[derive(Debug, Clone)]
pub struct DisassemblerConfig {
    pub format: DisassemblyFormat,
    pub show_shapes: bool,
    pub show_subroutines: bool,
}

impl Default for DisassemblerConfig {
    fn default() -> Self {
        Self {
            format: DisassemblyFormat::Verbose,
            show_shapes: false,
            show_subroutines: true,
        }
    }
}

pub struct Disassembler {
    config: DisassemblerConfig,
}

impl Disassembler {
    pub fn new() -> Self {
        Self {
            config: DisassemblerConfig::default(),
        }
    }

    pub fn with_format(format: DisassemblyFormat) -> Self {
        Self {
            config: DisassemblerConfig {
                format,
                ..Default::default()
            },
        }
    }

    pub fn show_shapes(mut self, show: bool) -> Self {
        self.config.show_shapes = show;
        self
    }

    pub fn show_subroutines(mut self, show: bool) -> Self {
        self.config.show_subroutines = show;
        self
    }

    pub fn disassemble(&self, chain: &Chain) -> String {
        let mut output = String::new();
        self.format_section(&mut output, chain, chain.head());

        if self.config.show_subroutines {
            for (name, head) in chain.subroutines() {
                match self.config.format {
                    DisassemblyFormat::Compact => {
                        let _ = writeln!(output, "; {name}");
                    }
                    DisassemblyFormat::Verbose => {
                        let _ = writeln!(output, ".sub {name}");
                    }
                }
                self.format_section(&mut output, chain, *head);
            }
        }
        output
    }

    /// Disassemble to a writer (for file output)
    pub fn disassemble_to_writer(&self, chain: &Chain, writer: &mut dyn Write) -> std::io::Result<()> {
        write!(writer, "{}", self.disassemble(chain))
    }

    fn format_section(&self, output: &mut String, chain: &Chain, head: OpId) {
        if self.config.format == DisassemblyFormat::Verbose && head == chain.head() {
            output.push_str(".main\n");
        }
        for id in chain.walk(head) {
            let inst = chain.get(id);
            match self.config.format {
                DisassemblyFormat::Compact => {
                    output.push_str(inst.opcode().name());
                }
                DisassemblyFormat::Verbose => {
                    let _ = write!(output, "  {:04}: {}", id.0, inst);
                    if let Some(next) = inst.next() {
                        let _ = write!(output, " -> {next}");
                    }
                    if self.config.show_shapes {
                        if let Some(shape) = inst.header().shape() {
                            let _ = write!(output, "  ; {shape}");
                        }
                    }
                }
            }
            output.push('\n');
        }
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}
