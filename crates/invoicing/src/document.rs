//! PDF invoice rendering.
//!
//! Invoices are simple one-page text documents, so they are emitted directly
//! as a minimal PDF 1.4 file (catalog, page tree, one page, Helvetica, one
//! content stream) rather than through a layout engine.

use crate::InvoiceOrder;

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: i32 = 72;
const LEADING: i32 = 16;

/// Render the invoice for a placed order as PDF bytes.
pub fn render_invoice_pdf(order: &InvoiceOrder) -> Vec<u8> {
    let mut lines = vec![
        format!("INVOICE - Supply Order #{}", order.order_id),
        format!("Supplier: {}", order.supplier_name),
        String::new(),
        "Items:".to_string(),
    ];
    for line in &order.lines {
        lines.push(format!("  {} (Qty: {})", line.title, line.mass));
    }
    let total: i64 = order.lines.iter().map(|l| l.mass).sum();
    lines.push(String::new());
    lines.push(format!("Total quantity: {total}"));

    let content = content_stream(&lines);
    let mut doc = PdfWriter::new();
    doc.object("<< /Type /Catalog /Pages 2 0 R >>");
    doc.object("<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    doc.object(&format!(
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
    ));
    doc.object("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");
    doc.stream_object(&content);
    doc.finish()
}

fn content_stream(lines: &[String]) -> String {
    let mut stream = String::from("BT\n/F1 12 Tf\n");
    stream.push_str(&format!("{} {} Td\n", MARGIN, PAGE_HEIGHT as i32 - MARGIN));
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            stream.push_str(&format!("0 {} Td\n", -LEADING));
        }
        stream.push_str(&format!("({}) Tj\n", escape_pdf_text(line)));
    }
    stream.push_str("ET");
    stream
}

/// `(`, `)` and `\` are string delimiters in PDF literals.
fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            // Helvetica with the default encoding only covers ASCII.
            _ => out.push('?'),
        }
    }
    out
}

/// Byte-offset-tracking writer for the PDF body, xref table and trailer.
struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        Self {
            buf: b"%PDF-1.4\n".to_vec(),
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, body: &str) {
        self.offsets.push(self.buf.len());
        let number = self.offsets.len();
        self.buf
            .extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn stream_object(&mut self, stream: &str) {
        self.offsets.push(self.buf.len());
        let number = self.offsets.len();
        self.buf.extend_from_slice(
            format!(
                "{number} 0 obj\n<< /Length {} >>\nstream\n{stream}\nendstream\nendobj\n",
                stream.len()
            )
            .as_bytes(),
        );
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let count = self.offsets.len() + 1;
        self.buf
            .extend_from_slice(format!("xref\n0 {count}\n").as_bytes());
        self.buf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &self.offsets {
            self.buf
                .extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        self.buf.extend_from_slice(
            format!(
                "trailer\n<< /Size {count} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n"
            )
            .as_bytes(),
        );
        self.buf
    }
}
